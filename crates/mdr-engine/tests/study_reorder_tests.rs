#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{context, create, item, run};
use mdr_core::{ExErrorKind, LeaseStore};
use mdr_engine::{EngineCommand, ItemCommand, ItemKind};
use mdr_store::SqliteLeaseStore;
use serde_json::json;

fn selection(selected: &str, order: u32) -> serde_json::Value {
    json!({
        "study_uid": "Study_1",
        "project_number": "P-1",
        "selected_uid": selected,
        "order": order
    })
}

#[test]
fn test_reorder_renumbers_selections() {
    // GIVEN three selections of one study
    let ctx = context();
    let a = create(&ctx, ItemKind::StudySelection, "Studies", selection("A", 1));
    let b = create(&ctx, ItemKind::StudySelection, "Studies", selection("B", 2));
    let c = create(&ctx, ItemKind::StudySelection, "Studies", selection("C", 3));

    // WHEN they are reordered c, a, b
    let reordered = run(
        &ctx,
        EngineCommand::ReorderStudySelections {
            study_uid: "Study_1".to_string(),
            ordered_uids: vec![c.clone(), a.clone(), b.clone()],
        },
    )
    .unwrap();

    // THEN the returned list follows the new order
    let uids: Vec<&str> = reordered
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["uid"].as_str().unwrap())
        .collect();
    assert_eq!(uids, vec![c.as_str(), a.as_str(), b.as_str()]);

    // AND every moved selection got a new draft version
    let by_study = item(
        &ctx,
        ItemKind::StudySelection,
        ItemCommand::ByStudy {
            study_uid: "Study_1".to_string(),
        },
    )
    .unwrap();
    assert!(by_study
        .as_array()
        .unwrap()
        .iter()
        .all(|s| s["version"] == "0.2"));
}

#[test]
fn test_reorder_requires_every_selection() {
    // GIVEN two selections
    let ctx = context();
    let a = create(&ctx, ItemKind::StudySelection, "Studies", selection("A", 1));
    create(&ctx, ItemKind::StudySelection, "Studies", selection("B", 2));

    // WHEN one is left out
    let err = run(
        &ctx,
        EngineCommand::ReorderStudySelections {
            study_uid: "Study_1".to_string(),
            ordered_uids: vec![a],
        },
    )
    .unwrap_err();

    // THEN nothing is written
    assert_eq!(err.kind(), ExErrorKind::Validation);
}

#[test]
fn test_reorder_blocked_by_foreign_lease() {
    // GIVEN another holder owns the study lease
    let ctx = context();
    let a = create(&ctx, ItemKind::StudySelection, "Studies", selection("A", 1));
    let leases = SqliteLeaseStore::new(ctx.database().clone());
    leases
        .acquire("Study_1", "bob", chrono::Duration::seconds(60))
        .unwrap();

    // WHEN alice reorders
    let err = run(
        &ctx,
        EngineCommand::ReorderStudySelections {
            study_uid: "Study_1".to_string(),
            ordered_uids: vec![a],
        },
    )
    .unwrap_err();

    // THEN the study is reported as locked
    assert_eq!(err.kind(), ExErrorKind::ResourceLocked);
    assert!(err.kind().is_retryable());
}
