#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{context, create, item, run};
use mdr_core::{ExErrorKind, ListQuery, LockToken, VersionSelector};
use mdr_engine::{EngineCommand, ItemCommand, ItemKind};
use serde_json::json;

#[test]
fn test_json_lifecycle_through_commands() {
    // GIVEN an objective template created from JSON
    let ctx = context();
    let uid = create(
        &ctx,
        ItemKind::ObjectiveTemplate,
        "Sponsor",
        json!({ "name": "To assess [Intervention]" }),
    );
    assert_eq!(uid, "ObjectiveTemplate_000001");

    // WHEN it is approved
    let approved = item(
        &ctx,
        ItemKind::ObjectiveTemplate,
        ItemCommand::Approve {
            uid: uid.clone(),
            change_description: None,
            expected: None,
        },
    )
    .unwrap();

    // THEN the rendered view carries version, status and flattened payload
    assert_eq!(approved["version"], "1.0");
    assert_eq!(approved["status"], "Final");
    assert_eq!(approved["name"], "To assess [Intervention]");
    assert_eq!(approved["library"]["name"], "Sponsor");

    let actions = item(
        &ctx,
        ItemKind::ObjectiveTemplate,
        ItemCommand::PossibleActions { uid: uid.clone() },
    )
    .unwrap();
    assert_eq!(actions, json!(["new_version", "retire"]));
}

#[test]
fn test_invalid_payload_is_a_validation_error() {
    // GIVEN a ct term payload missing its codelist
    let ctx = context();

    // WHEN creating it
    let err = item(
        &ctx,
        ItemKind::CtTermName,
        ItemCommand::Create {
            library: "Sponsor".to_string(),
            payload: json!({ "name": "Visit" }),
            change_description: None,
        },
    )
    .unwrap_err();

    // THEN the command fails before touching storage
    assert_eq!(err.kind(), ExErrorKind::Validation);
    assert_eq!(err.entity_kind(), Some("CtTermName"));
}

#[test]
fn test_pinned_stale_token_is_not_retried() {
    // GIVEN a draft edited once
    let ctx = context();
    let uid = create(
        &ctx,
        ItemKind::ActivityConcept,
        "Sponsor",
        json!({ "name": "Vital signs", "name_sentence_case": "vital signs" }),
    );
    let edit = |expected| ItemCommand::Edit {
        uid: uid.clone(),
        payload: json!({ "name": "Vital Signs", "name_sentence_case": "vital signs" }),
        change_description: None,
        expected,
    };
    item(&ctx, ItemKind::ActivityConcept, edit(Some(LockToken(1)))).unwrap();

    // WHEN the caller edits again with the token it saw before
    let err = item(&ctx, ItemKind::ActivityConcept, edit(Some(LockToken(1)))).unwrap_err();

    // THEN the conflict is reported instead of silently retried
    assert_eq!(err.kind(), ExErrorKind::ConcurrentModification);
}

#[test]
fn test_list_filters_across_rendered_fields() {
    // GIVEN three ct terms in two codelists
    let ctx = context();
    for (codelist, name) in [("C1", "Visit"), ("C1", "Vital"), ("C2", "Visit")] {
        create(
            &ctx,
            ItemKind::CtTermName,
            "Sponsor",
            json!({ "codelist_uid": codelist, "name": name, "name_sentence_case": name.to_lowercase() }),
        );
    }

    // WHEN listing with a filter and a sort
    let query: ListQuery = serde_json::from_value(json!({
        "filters": [{ "field": "name", "op": "eq", "value": "Visit" }],
        "sort": [{ "field": "codelist_uid", "ascending": false }],
        "total_count": true
    }))
    .unwrap();
    let page = item(&ctx, ItemKind::CtTermName, ItemCommand::List { query }).unwrap();

    // THEN only matching items come back in the requested order
    assert_eq!(page["total_count"], 2);
    let codelists: Vec<&str> = page["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["codelist_uid"].as_str().unwrap())
        .collect();
    assert_eq!(codelists, vec!["C2", "C1"]);
}

#[test]
fn test_cache_info_and_clear() {
    // GIVEN a cached lookup
    let ctx = context();
    let uid = create(
        &ctx,
        ItemKind::ObjectiveTemplate,
        "Sponsor",
        json!({ "name": "Obj A" }),
    );
    item(
        &ctx,
        ItemKind::ObjectiveTemplate,
        ItemCommand::Get {
            uid: uid.clone(),
            selector: VersionSelector::Latest,
        },
    )
    .unwrap();

    // WHEN inspecting the caches
    let info = run(&ctx, EngineCommand::CacheInfo { include_keys: true }).unwrap();

    // THEN every kind reports three stores and the uid is cached
    let stores = info.as_array().unwrap();
    assert_eq!(stores.len(), 12);
    let by_uid = stores
        .iter()
        .find(|s| {
            s["repository"] == "ObjectiveTemplateRepository"
                && s["store_name"] == "cache_store_item_by_uid"
        })
        .unwrap();
    assert_eq!(by_uid["size"], 1);
    assert_eq!(by_uid["keys"], json!([uid]));

    // AND clearing empties them
    let cleared = run(&ctx, EngineCommand::CacheClear).unwrap();
    assert_eq!(cleared["cleared_repositories"], 4);
    let info = run(&ctx, EngineCommand::CacheInfo { include_keys: false }).unwrap();
    assert!(info.as_array().unwrap().iter().all(|s| s["size"] == 0));
}

#[test]
fn test_locking_a_library_blocks_edits_of_cached_items() {
    // GIVEN a draft in an editable library, read once so it sits in the cache
    let ctx = context();
    let uid = create(
        &ctx,
        ItemKind::ObjectiveTemplate,
        "Sponsor",
        json!({ "name": "Obj A" }),
    );
    let before = item(
        &ctx,
        ItemKind::ObjectiveTemplate,
        ItemCommand::Get {
            uid: uid.clone(),
            selector: VersionSelector::Latest,
        },
    )
    .unwrap();
    assert_eq!(before["library"]["is_editable"], true);

    // WHEN the library is locked
    run(
        &ctx,
        EngineCommand::SetLibraryEditable {
            name: "Sponsor".to_string(),
            is_editable: false,
        },
    )
    .unwrap();

    // THEN editing fails with LibraryNotEditable
    let err = item(
        &ctx,
        ItemKind::ObjectiveTemplate,
        ItemCommand::Edit {
            uid: uid.clone(),
            payload: json!({ "name": "Obj B" }),
            change_description: None,
            expected: None,
        },
    )
    .unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::LibraryNotEditable);
    assert_eq!(err.code(), "ERR_LIBRARY_NOT_EDITABLE");

    // AND the stored draft and its rendered library reflect the lock
    let after = item(
        &ctx,
        ItemKind::ObjectiveTemplate,
        ItemCommand::Get {
            uid: uid.clone(),
            selector: VersionSelector::Latest,
        },
    )
    .unwrap();
    assert_eq!(after["name"], "Obj A");
    assert_eq!(after["library"]["is_editable"], false);

    // AND approval is still allowed in a locked library
    let approved = item(
        &ctx,
        ItemKind::ObjectiveTemplate,
        ItemCommand::Approve {
            uid,
            change_description: None,
            expected: None,
        },
    )
    .unwrap();
    assert_eq!(approved["status"], "Final");
}
