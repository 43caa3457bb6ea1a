//! Item lifecycle commands

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use mdr_core::service::filtering::ListQuery;
use mdr_core::{LibraryItemStatus, LockToken, Version, VersionSelector};
use mdr_engine::{EngineCommand, ItemCommand, ItemKind};
use serde_json::Value;

use super::{run_and_print, GlobalArgs};

#[derive(Debug, Args)]
pub struct ItemArgs {
    /// objective-template | ct-term | activity | study-selection
    pub kind: ItemKind,

    #[command(subcommand)]
    pub command: ItemSubcommand,
}

/// Token observed by the caller; omit to retry conflicts automatically
#[derive(Debug, Args)]
pub struct TokenArg {
    #[arg(long)]
    pub lock_token: Option<u64>,
}

impl TokenArg {
    fn expected(&self) -> Option<LockToken> {
        self.lock_token.map(LockToken)
    }
}

#[derive(Debug, Subcommand)]
pub enum ItemSubcommand {
    /// Create a Draft 0.1 item
    Create {
        #[arg(long)]
        library: String,
        /// JSON payload
        #[arg(long)]
        payload: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Show one snapshot (current unless a selector is given)
    Get {
        uid: String,
        #[arg(long, conflicts_with_all = ["status", "as_of"])]
        version: Option<Version>,
        #[arg(long, conflicts_with = "as_of")]
        status: Option<LibraryItemStatus>,
        /// RFC 3339 instant
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
    /// Replace the payload of a Draft
    Edit {
        uid: String,
        #[arg(long)]
        payload: String,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        token: TokenArg,
    },
    Approve {
        uid: String,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        token: TokenArg,
    },
    NewVersion {
        uid: String,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        token: TokenArg,
    },
    Retire {
        uid: String,
        #[command(flatten)]
        token: TokenArg,
    },
    Reactivate {
        uid: String,
        #[command(flatten)]
        token: TokenArg,
    },
    /// Hard-delete a never-approved Draft
    Delete {
        uid: String,
        #[command(flatten)]
        token: TokenArg,
    },
    /// Version history, newest first
    Versions { uid: String },
    /// Final and Retired versions
    Releases { uid: String },
    /// Actions allowed from the current status
    Actions { uid: String },
    /// Filtered, sorted, paginated listing of current versions
    List {
        /// Full query as JSON; flags below override its fields
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        status: Option<LibraryItemStatus>,
        #[arg(long)]
        library: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
        #[arg(long)]
        total_count: bool,
    },
    /// Current items of a study
    ByStudy { study_uid: String },
    /// Current items of a project
    ByProject { project_number: String },
}

fn parse_json(flag: &str, raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--{} is not valid JSON", flag))
}

fn to_command(sub: ItemSubcommand) -> anyhow::Result<ItemCommand> {
    Ok(match sub {
        ItemSubcommand::Create {
            library,
            payload,
            description,
        } => ItemCommand::Create {
            library,
            payload: parse_json("payload", &payload)?,
            change_description: description,
        },
        ItemSubcommand::Get {
            uid,
            version,
            status,
            as_of,
        } => ItemCommand::Get {
            uid,
            selector: VersionSelector::from_parts(version, status, as_of)?,
        },
        ItemSubcommand::Edit {
            uid,
            payload,
            description,
            token,
        } => ItemCommand::Edit {
            uid,
            payload: parse_json("payload", &payload)?,
            change_description: description,
            expected: token.expected(),
        },
        ItemSubcommand::Approve {
            uid,
            description,
            token,
        } => ItemCommand::Approve {
            uid,
            change_description: description,
            expected: token.expected(),
        },
        ItemSubcommand::NewVersion {
            uid,
            description,
            token,
        } => ItemCommand::NewVersion {
            uid,
            change_description: description,
            expected: token.expected(),
        },
        ItemSubcommand::Retire { uid, token } => ItemCommand::Retire {
            uid,
            expected: token.expected(),
        },
        ItemSubcommand::Reactivate { uid, token } => ItemCommand::Reactivate {
            uid,
            expected: token.expected(),
        },
        ItemSubcommand::Delete { uid, token } => ItemCommand::Delete {
            uid,
            expected: token.expected(),
        },
        ItemSubcommand::Versions { uid } => ItemCommand::Versions { uid },
        ItemSubcommand::Releases { uid } => ItemCommand::Releases { uid },
        ItemSubcommand::Actions { uid } => ItemCommand::PossibleActions { uid },
        ItemSubcommand::List {
            query,
            status,
            library,
            page,
            page_size,
            total_count,
        } => {
            let mut query: ListQuery = match query {
                Some(raw) => serde_json::from_value(parse_json("query", &raw)?)
                    .context("--query does not describe a list query")?,
                None => ListQuery::default(),
            };
            if status.is_some() {
                query.status = status;
            }
            if library.is_some() {
                query.library_name = library;
            }
            if let Some(page) = page {
                query.page_number = page;
            }
            if page_size.is_some() {
                query.page_size = page_size;
            }
            query.total_count |= total_count;
            ItemCommand::List { query }
        }
        ItemSubcommand::ByStudy { study_uid } => ItemCommand::ByStudy { study_uid },
        ItemSubcommand::ByProject { project_number } => ItemCommand::ByProject { project_number },
    })
}

pub fn execute(global: &GlobalArgs, args: ItemArgs) -> anyhow::Result<()> {
    let command = to_command(args.command)?;
    let ctx = global.open()?;
    run_and_print(
        global,
        &ctx,
        EngineCommand::Item {
            kind: args.kind,
            command,
        },
    )
}
