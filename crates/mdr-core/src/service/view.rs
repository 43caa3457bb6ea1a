use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::concurrency::LockToken;
use crate::errors::ExError;
use crate::model::{Library, LibraryItem, LibraryItemStatus, ObjectAction, Payload, Version};

/// External projection of one snapshot of an aggregate root
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemView<P> {
    pub uid: String,
    #[serde(flatten)]
    pub payload: P,
    pub library: Library,
    pub version: Version,
    pub status: LibraryItemStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub author: String,
    pub change_description: Option<String>,
    pub lock_token: Option<LockToken>,
    pub possible_actions: Vec<ObjectAction>,
}

impl<P: Payload> ItemView<P> {
    pub fn from_item(item: &LibraryItem<P>) -> Self {
        let meta = item.meta();
        Self {
            uid: item.uid().to_string(),
            payload: item.payload().clone(),
            library: item.library().clone(),
            version: meta.version,
            status: meta.status,
            start_date: meta.start_date,
            end_date: meta.end_date,
            author: meta.author.clone(),
            change_description: meta.change_description.clone(),
            lock_token: item.lock_token(),
            possible_actions: item.possible_actions(),
        }
    }
}

/// One entry of a version history, flagged with the fields that changed
/// relative to the previous (older) entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionHistoryEntry<P> {
    #[serde(flatten)]
    pub item: ItemView<P>,
    pub changes: BTreeMap<String, bool>,
}

/// Fields that differ between every pair of snapshots and carry no content
const IGNORED_DIFF_FIELDS: &[&str] = &["start_date", "end_date", "lock_token", "possible_actions"];

fn diff_fields(newer: &Value, older: &Value) -> BTreeMap<String, bool> {
    let (Value::Object(newer), Value::Object(older)) = (newer, older) else {
        return BTreeMap::new();
    };
    newer
        .keys()
        .chain(older.keys())
        .filter(|key| !IGNORED_DIFF_FIELDS.contains(&key.as_str()))
        .map(|key| (key.clone(), newer.get(key) != older.get(key)))
        .collect()
}

/// Build history entries from items ordered newest first
pub fn history_with_changes<P: Payload>(
    items: &[LibraryItem<P>],
) -> Result<Vec<VersionHistoryEntry<P>>, ExError> {
    let views: Vec<ItemView<P>> = items.iter().map(ItemView::from_item).collect();
    let values = views
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<Value>, _>>()?;

    Ok(views
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            let changes = values
                .get(idx + 1)
                .map(|older| diff_fields(&values[idx], older))
                .unwrap_or_default();
            VersionHistoryEntry { item, changes }
        })
        .collect())
}
