use std::path::PathBuf;

use mdr_core_types::RequestContext;
use mdr_engine::{apply_engine_command, EngineCommand, ItemCommand, ItemKind, MdrConfig, MdrContext};
use serde_json::Value;

/// In-memory context seeded with an editable "Sponsor", a locked "CDISC"
/// and an editable "Studies" library
#[allow(dead_code)]
pub fn context() -> MdrContext {
    let mut config = MdrConfig::default();
    config.database.path = PathBuf::from(":memory:");
    let ctx = MdrContext::open(&config).unwrap();
    for (name, is_editable) in [("Sponsor", true), ("CDISC", false), ("Studies", true)] {
        run(
            &ctx,
            EngineCommand::CreateLibrary {
                name: name.to_string(),
                is_editable,
            },
        )
        .unwrap();
    }
    ctx
}

#[allow(dead_code)]
pub fn request() -> RequestContext {
    RequestContext::new("alice")
}

#[allow(dead_code)]
pub fn run(ctx: &MdrContext, cmd: EngineCommand) -> Result<Value, mdr_core::ExError> {
    apply_engine_command(cmd, ctx, &request())
}

#[allow(dead_code)]
pub fn item(ctx: &MdrContext, kind: ItemKind, command: ItemCommand) -> Result<Value, mdr_core::ExError> {
    run(ctx, EngineCommand::Item { kind, command })
}

/// Create an item and return its uid
#[allow(dead_code)]
pub fn create(ctx: &MdrContext, kind: ItemKind, library: &str, payload: Value) -> String {
    let created = item(
        ctx,
        kind,
        ItemCommand::Create {
            library: library.to_string(),
            payload,
            change_description: None,
        },
    )
    .unwrap();
    created["uid"].as_str().unwrap().to_string()
}
