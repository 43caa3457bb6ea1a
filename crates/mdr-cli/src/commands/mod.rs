//! Subcommand implementations

pub mod cache;
pub mod item;
pub mod library;
pub mod migrate;
pub mod study;

use std::path::{Path, PathBuf};

use anyhow::Context;
use mdr_core::logging_facility;
use mdr_core_types::RequestContext;
use mdr_engine::{apply_engine_command, config, EngineCommand, MdrContext};

const DEFAULT_CONFIG_FILE: &str = "mdr.toml";

/// Options shared by every subcommand
#[derive(Debug)]
pub struct GlobalArgs {
    pub config: Option<PathBuf>,
    pub db: Option<PathBuf>,
    pub author: String,
}

impl GlobalArgs {
    /// Load configuration, start logging and open the context
    pub fn open(&self) -> anyhow::Result<MdrContext> {
        let path = self
            .config
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = config::load(Some(path))
            .with_context(|| format!("loading configuration from {}", path.display()))?;
        if let Some(db) = &self.db {
            config.database.path = db.clone();
        }

        logging_facility::init(config.profile()?);
        tracing::debug!(db = %config.database.path.display(), "opening context");

        Ok(MdrContext::open(&config)?)
    }

    pub fn request(&self) -> RequestContext {
        RequestContext::new(&self.author)
    }
}

/// Run one engine command and print its JSON result
pub fn run_and_print(global: &GlobalArgs, ctx: &MdrContext, cmd: EngineCommand) -> anyhow::Result<()> {
    let value = apply_engine_command(cmd, ctx, &global.request())?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
