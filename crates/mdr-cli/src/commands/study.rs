//! Study-scoped commands

use clap::{Args, Subcommand};
use mdr_engine::EngineCommand;

use super::{run_and_print, GlobalArgs};

#[derive(Debug, Args)]
pub struct StudyArgs {
    #[command(subcommand)]
    pub command: StudyCommand,
}

#[derive(Debug, Subcommand)]
pub enum StudyCommand {
    /// Renumber a study's selections in the given order, under the study lease
    Reorder {
        study_uid: String,
        /// Every selection uid of the study, in the new order
        #[arg(required = true)]
        uids: Vec<String>,
    },
}

pub fn execute(global: &GlobalArgs, args: StudyArgs) -> anyhow::Result<()> {
    let ctx = global.open()?;
    let cmd = match args.command {
        StudyCommand::Reorder { study_uid, uids } => EngineCommand::ReorderStudySelections {
            study_uid,
            ordered_uids: uids,
        },
    };
    run_and_print(global, &ctx, cmd)
}
