//! Library administration commands

use clap::{Args, Subcommand};
use mdr_engine::EngineCommand;

use super::{run_and_print, GlobalArgs};

#[derive(Debug, Args)]
pub struct LibraryArgs {
    #[command(subcommand)]
    pub command: LibraryCommand,
}

#[derive(Debug, Subcommand)]
pub enum LibraryCommand {
    /// Register a library
    Add {
        name: String,
        /// Create the library locked against edits
        #[arg(long)]
        locked: bool,
    },
    /// List libraries
    List,
    /// Lock a library against create and edit
    Lock { name: String },
    /// Allow create and edit again
    Unlock { name: String },
}

pub fn execute(global: &GlobalArgs, args: LibraryArgs) -> anyhow::Result<()> {
    let ctx = global.open()?;
    let cmd = match args.command {
        LibraryCommand::Add { name, locked } => EngineCommand::CreateLibrary {
            name,
            is_editable: !locked,
        },
        LibraryCommand::List => EngineCommand::ListLibraries,
        LibraryCommand::Lock { name } => EngineCommand::SetLibraryEditable {
            name,
            is_editable: false,
        },
        LibraryCommand::Unlock { name } => EngineCommand::SetLibraryEditable {
            name,
            is_editable: true,
        },
    };
    run_and_print(global, &ctx, cmd)
}
