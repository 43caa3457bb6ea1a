//! Cache diagnostics
//!
//! Caches live for one process, so these mostly serve scripted sessions.

use clap::{Args, Subcommand};
use mdr_engine::EngineCommand;

use super::{run_and_print, GlobalArgs};

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Occupancy of every cache store
    List {
        /// Include cached keys
        #[arg(long)]
        keys: bool,
    },
    /// Clear every cache
    Clear,
}

pub fn execute(global: &GlobalArgs, args: CacheArgs) -> anyhow::Result<()> {
    let ctx = global.open()?;
    let cmd = match args.command {
        CacheCommand::List { keys } => EngineCommand::CacheInfo { include_keys: keys },
        CacheCommand::Clear => EngineCommand::CacheClear,
    };
    run_and_print(global, &ctx, cmd)
}
