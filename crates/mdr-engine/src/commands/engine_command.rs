//! Engine-level commands over every entity kind.

use serde::Serialize;
use serde_json::{json, Value};

use mdr_core::concurrency::LockToken;
use mdr_core::errors::{ExError, ExErrorKind};
use mdr_core::model::Library;
use mdr_core::retry::{with_retry, RetryPolicy};
use mdr_core::{GenericRepository, GenericService, ListQuery, Payload, VersionSelector};
use mdr_core_types::RequestContext;

use crate::commands::item_kind::ItemKind;
use crate::commands::study::reorder_study_selections;
use crate::context::MdrContext;

/// Lifecycle and query commands for one item of any kind
#[derive(Debug, Clone)]
pub enum ItemCommand {
    Create {
        library: String,
        payload: Value,
        change_description: Option<String>,
    },
    Get {
        uid: String,
        selector: VersionSelector,
    },
    Edit {
        uid: String,
        payload: Value,
        change_description: Option<String>,
        expected: Option<LockToken>,
    },
    Approve {
        uid: String,
        change_description: Option<String>,
        expected: Option<LockToken>,
    },
    NewVersion {
        uid: String,
        change_description: Option<String>,
        expected: Option<LockToken>,
    },
    Retire {
        uid: String,
        expected: Option<LockToken>,
    },
    Reactivate {
        uid: String,
        expected: Option<LockToken>,
    },
    Delete {
        uid: String,
        expected: Option<LockToken>,
    },
    Versions {
        uid: String,
    },
    Releases {
        uid: String,
    },
    PossibleActions {
        uid: String,
    },
    List {
        query: ListQuery,
    },
    ByStudy {
        study_uid: String,
    },
    ByProject {
        project_number: String,
    },
}

/// Engine-level commands
#[derive(Debug, Clone)]
pub enum EngineCommand {
    CreateLibrary {
        name: String,
        is_editable: bool,
    },
    SetLibraryEditable {
        name: String,
        is_editable: bool,
    },
    ListLibraries,
    Item {
        kind: ItemKind,
        command: ItemCommand,
    },
    /// Rewrite the `order` of every selection of a study under its lease
    ReorderStudySelections {
        study_uid: String,
        ordered_uids: Vec<String>,
    },
    CacheInfo {
        include_keys: bool,
    },
    CacheClear,
}

/// Apply an engine command; the result is rendered as JSON
pub fn apply_engine_command(
    cmd: EngineCommand,
    ctx: &MdrContext,
    request: &RequestContext,
) -> Result<Value, ExError> {
    match cmd {
        EngineCommand::CreateLibrary { name, is_editable } => {
            let library = Library::new(name, is_editable);
            ctx.libraries().create_library(&library)?;
            to_json(&library)
        }
        EngineCommand::SetLibraryEditable { name, is_editable } => {
            ctx.libraries().set_editable(&name, is_editable)?;
            let cleared = ctx.caches().clear_all();
            tracing::info!(library = %name, is_editable, cleared, "library editability changed");
            to_json(&Library::new(name, is_editable))
        }
        EngineCommand::ListLibraries => to_json(&ctx.libraries().list_libraries()?),
        EngineCommand::Item { kind, command } => {
            let retry = ctx.retry_policy();
            match kind {
                ItemKind::ObjectiveTemplate => {
                    run_item(&ctx.objective_templates, command, request, retry)
                }
                ItemKind::CtTermName => run_item(&ctx.ct_terms, command, request, retry),
                ItemKind::ActivityConcept => run_item(&ctx.activities, command, request, retry),
                ItemKind::StudySelection => {
                    run_item(&ctx.study_selections, command, request, retry)
                }
            }
        }
        EngineCommand::ReorderStudySelections {
            study_uid,
            ordered_uids,
        } => to_json(&reorder_study_selections(
            &ctx.study_selections,
            request,
            &study_uid,
            &ordered_uids,
        )?),
        EngineCommand::CacheInfo { include_keys } => to_json(&ctx.caches().cache_info(include_keys)),
        EngineCommand::CacheClear => {
            let cleared = ctx.caches().clear_all();
            Ok(json!({ "cleared_repositories": cleared }))
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ExError> {
    Ok(serde_json::to_value(value)?)
}

fn parse_payload<P: Payload>(payload: Value) -> Result<P, ExError> {
    serde_json::from_value(payload).map_err(|e| {
        ExError::new(ExErrorKind::Validation)
            .with_op("parse_payload")
            .with_entity_kind(P::KIND)
            .with_message(format!("invalid {} payload: {}", P::KIND, e))
    })
}

/// Run a mutation, retrying conflicts only when the caller did not pin a
/// lock token
fn mutate<T>(
    retry: &RetryPolicy,
    expected: Option<LockToken>,
    mut op: impl FnMut() -> Result<T, ExError>,
) -> Result<T, ExError> {
    match expected {
        Some(_) => op(),
        None => with_retry(retry, |_| op()),
    }
}

fn run_item<P, R>(
    svc: &GenericService<P, R>,
    command: ItemCommand,
    request: &RequestContext,
    retry: &RetryPolicy,
) -> Result<Value, ExError>
where
    P: Payload,
    R: GenericRepository<P>,
{
    match command {
        ItemCommand::Create {
            library,
            payload,
            change_description,
        } => {
            let payload: P = parse_payload(payload)?;
            to_json(&mutate(retry, None, || {
                svc.create(request, &library, payload.clone(), change_description.clone())
            })?)
        }
        ItemCommand::Get { uid, selector } => to_json(&svc.get(&uid, &selector)?),
        ItemCommand::Edit {
            uid,
            payload,
            change_description,
            expected,
        } => {
            let payload: P = parse_payload(payload)?;
            to_json(&mutate(retry, expected, || {
                svc.edit(
                    request,
                    &uid,
                    payload.clone(),
                    change_description.clone(),
                    expected,
                )
            })?)
        }
        ItemCommand::Approve {
            uid,
            change_description,
            expected,
        } => to_json(&mutate(retry, expected, || {
            svc.approve(request, &uid, change_description.clone(), expected)
        })?),
        ItemCommand::NewVersion {
            uid,
            change_description,
            expected,
        } => to_json(&mutate(retry, expected, || {
            svc.new_version(request, &uid, change_description.clone(), expected)
        })?),
        ItemCommand::Retire { uid, expected } => to_json(&mutate(retry, expected, || {
            svc.retire(request, &uid, expected)
        })?),
        ItemCommand::Reactivate { uid, expected } => to_json(&mutate(retry, expected, || {
            svc.reactivate(request, &uid, expected)
        })?),
        ItemCommand::Delete { uid, expected } => {
            mutate(retry, expected, || svc.delete(request, &uid, expected))?;
            Ok(json!({ "uid": uid, "deleted": true }))
        }
        ItemCommand::Versions { uid } => to_json(&svc.get_versions(&uid)?),
        ItemCommand::Releases { uid } => to_json(&svc.get_releases(&uid)?),
        ItemCommand::PossibleActions { uid } => to_json(&svc.possible_actions(&uid)?),
        ItemCommand::List { query } => to_json(&svc.list(&query)?),
        ItemCommand::ByStudy { study_uid } => to_json(&svc.get_by_study(&study_uid)?),
        ItemCommand::ByProject { project_number } => {
            to_json(&svc.get_by_project(&project_number)?)
        }
    }
}
