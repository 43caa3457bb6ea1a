//! Row to model conversion for the item tables

use chrono::{DateTime, Utc};
use rusqlite::Row;

use crate::errors::{corrupt_row, Result};
use mdr_core::model::{
    Library, LibraryItem, LibraryItemStatus, Payload, Version, VersionMetadata, VersionSnapshot,
};

/// Root columns, aliased `r` (item_roots) and `l` (libraries)
pub(crate) const ROOT_COLUMNS: &str =
    "r.uid, r.library_name, l.is_editable, r.current_seq, r.has_final";

/// Snapshot columns, aliased `v` (item_versions)
pub(crate) const VERSION_COLUMNS: &str = "v.seq, v.major, v.minor, v.status, v.start_date, \
     v.end_date, v.author, v.change_description, v.payload";

pub(crate) const ROOT_WIDTH: usize = 5;

pub(crate) fn to_micros(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_micros()
}

pub(crate) fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| corrupt_row("item_versions", format!("timestamp {} out of range", micros)))
}

/// item_roots joined with its library
#[derive(Debug, Clone)]
pub(crate) struct RootRow {
    pub uid: String,
    pub library: Library,
    pub current_seq: u64,
    pub has_final: bool,
}

impl RootRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let current_seq: i64 = row.get(3)?;
        Ok(Self {
            uid: row.get(0)?,
            library: Library::new(row.get::<_, String>(1)?, row.get::<_, bool>(2)?),
            current_seq: current_seq as u64,
            has_final: row.get(4)?,
        })
    }

    pub fn view<P: Payload>(&self, snapshot: VersionSnapshot<P>) -> LibraryItem<P> {
        LibraryItem::hydrate(
            self.uid.clone(),
            self.library.clone(),
            snapshot,
            self.current_seq,
            self.has_final,
        )
    }
}

/// Raw item_versions row, decoded in a second step so payload errors
/// surface as `Serialization` rather than SQLite errors
#[derive(Debug, Clone)]
pub(crate) struct SnapshotRow {
    seq: i64,
    major: i64,
    minor: i64,
    status: String,
    start_date: i64,
    end_date: Option<i64>,
    author: String,
    change_description: Option<String>,
    payload: String,
}

impl SnapshotRow {
    /// Read the snapshot columns starting at `offset`
    pub fn from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            seq: row.get(offset)?,
            major: row.get(offset + 1)?,
            minor: row.get(offset + 2)?,
            status: row.get(offset + 3)?,
            start_date: row.get(offset + 4)?,
            end_date: row.get(offset + 5)?,
            author: row.get(offset + 6)?,
            change_description: row.get(offset + 7)?,
            payload: row.get(offset + 8)?,
        })
    }

    pub fn into_snapshot<P: Payload>(self) -> Result<VersionSnapshot<P>> {
        let status: LibraryItemStatus = self
            .status
            .parse()
            .map_err(|e| corrupt_row("item_versions", e))?;
        let payload: P = serde_json::from_str(&self.payload)
            .map_err(|e| corrupt_row("item_versions", e))?;
        let end_date = match self.end_date {
            Some(micros) => Some(from_micros(micros)?),
            None => None,
        };
        Ok(VersionSnapshot {
            meta: VersionMetadata {
                seq: self.seq as u64,
                version: Version::new(self.major as u32, self.minor as u32),
                status,
                start_date: from_micros(self.start_date)?,
                end_date,
                author: self.author,
                change_description: self.change_description,
            },
            payload,
        })
    }
}
