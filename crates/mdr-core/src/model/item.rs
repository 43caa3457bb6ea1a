use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::kinds::Payload;
use super::library::Library;
use super::metadata::{now_micros, VersionMetadata};
use super::version::{LibraryItemStatus, ObjectAction, Version};
use crate::concurrency::LockToken;
use crate::errors::MdrError;
use crate::lifecycle;

/// Immutable version snapshot: lifecycle metadata plus the payload at that time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSnapshot<P> {
    pub meta: VersionMetadata,
    pub payload: P,
}

/// Aggregate root of one versioned library item
///
/// A loaded item is a view on one snapshot of the root's append-only log,
/// normally the current one. Transitions append new snapshots to an in-memory
/// pending list; a repository `save` persists them atomically and checks the
/// current pointer has not moved since `head_seq` was read.
#[derive(Debug, Clone)]
pub struct LibraryItem<P: Payload> {
    uid: String,
    library: Library,
    snapshot: VersionSnapshot<P>,
    /// Sequence of the persisted current snapshot when this item was loaded
    head_seq: Option<u64>,
    has_final_ancestor: bool,
    pending: Vec<VersionSnapshot<P>>,
    /// A pending snapshot came from create or edit
    pending_content: bool,
    pending_delete: bool,
    deleted: bool,
}

impl<P: Payload> LibraryItem<P> {
    /// Start a new aggregate root in Draft 0.1
    ///
    /// # Errors
    ///
    /// `LibraryNotEditable` for a locked library, `Validation` for a
    /// malformed payload.
    pub fn create(
        uid: String,
        library: Library,
        payload: P,
        author: &str,
        change_description: Option<String>,
    ) -> Result<Self, MdrError> {
        if !library.is_editable {
            return Err(MdrError::LibraryNotEditable {
                library: library.name,
            });
        }
        payload.validate()?;

        let snapshot = VersionSnapshot {
            meta: VersionMetadata {
                seq: 1,
                version: Version::INITIAL,
                status: LibraryItemStatus::Draft,
                start_date: now_micros(),
                end_date: None,
                author: author.to_string(),
                change_description,
            },
            payload,
        };

        Ok(Self {
            uid,
            library,
            pending: vec![snapshot.clone()],
            snapshot,
            head_seq: None,
            has_final_ancestor: false,
            pending_content: true,
            pending_delete: false,
            deleted: false,
        })
    }

    /// Rebuild an item from persisted state
    pub fn hydrate(
        uid: String,
        library: Library,
        snapshot: VersionSnapshot<P>,
        head_seq: u64,
        has_final_ancestor: bool,
    ) -> Self {
        Self {
            uid,
            library,
            snapshot,
            head_seq: Some(head_seq),
            has_final_ancestor,
            pending: Vec::new(),
            pending_content: false,
            pending_delete: false,
            deleted: false,
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn snapshot(&self) -> &VersionSnapshot<P> {
        &self.snapshot
    }

    pub fn payload(&self) -> &P {
        &self.snapshot.payload
    }

    pub fn meta(&self) -> &VersionMetadata {
        &self.snapshot.meta
    }

    pub fn version(&self) -> Version {
        self.snapshot.meta.version
    }

    pub fn status(&self) -> LibraryItemStatus {
        self.snapshot.meta.status
    }

    pub fn has_final_ancestor(&self) -> bool {
        self.has_final_ancestor
    }

    /// Current pointer observed when the item was read (None before first save)
    pub fn head_seq(&self) -> Option<u64> {
        self.head_seq
    }

    /// Optimistic lock token callers echo back on mutation
    pub fn lock_token(&self) -> Option<LockToken> {
        self.head_seq.map(LockToken)
    }

    /// Snapshots appended since the last save, oldest first
    pub fn pending(&self) -> &[VersionSnapshot<P>] {
        &self.pending
    }

    /// Whether saving must re-check that the owning library is editable
    pub fn needs_editable_library(&self) -> bool {
        self.pending_content
    }

    pub fn is_pending_delete(&self) -> bool {
        self.pending_delete
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Whether this view shows a superseded snapshot
    pub fn is_historical(&self) -> bool {
        self.head_seq
            .is_some_and(|head| self.snapshot.meta.seq < head)
    }

    /// Actions valid on this item now; empty for historical or deleted views
    pub fn possible_actions(&self) -> Vec<ObjectAction> {
        if self.is_historical() || self.deleted || self.pending_delete {
            return Vec::new();
        }
        lifecycle::possible_actions(self.status(), self.has_final_ancestor)
    }

    /// Draft -> Draft with a new payload, minor + 1
    pub fn edit(
        &mut self,
        payload: P,
        author: &str,
        change_description: Option<String>,
    ) -> Result<(), MdrError> {
        self.guard(ObjectAction::Edit)?;
        if !self.library.is_editable {
            return Err(MdrError::LibraryNotEditable {
                library: self.library.name.clone(),
            });
        }
        payload.validate()?;
        self.append(ObjectAction::Edit, Some(payload), author, change_description)?;
        self.pending_content = true;
        Ok(())
    }

    /// Draft -> Final, next major
    pub fn approve(&mut self, author: &str, change_description: Option<String>) -> Result<(), MdrError> {
        self.guard(ObjectAction::Approve)?;
        self.snapshot.payload.validate()?;
        self.append(ObjectAction::Approve, None, author, change_description)
    }

    /// Final -> Draft carrying the Final payload, `<major>.1`
    pub fn new_version(
        &mut self,
        author: &str,
        change_description: Option<String>,
    ) -> Result<(), MdrError> {
        self.guard(ObjectAction::NewVersion)?;
        self.append(ObjectAction::NewVersion, None, author, change_description)
    }

    /// Final -> Retired, version unchanged
    pub fn retire(&mut self, author: &str, change_description: Option<String>) -> Result<(), MdrError> {
        self.guard(ObjectAction::Retire)?;
        self.append(ObjectAction::Retire, None, author, change_description)
    }

    /// Retired -> Final, version unchanged
    pub fn reactivate(
        &mut self,
        author: &str,
        change_description: Option<String>,
    ) -> Result<(), MdrError> {
        self.guard(ObjectAction::Reactivate)?;
        self.append(ObjectAction::Reactivate, None, author, change_description)
    }

    /// Mark a never-approved Draft for hard deletion on the next save
    pub fn mark_deleted(&mut self) -> Result<(), MdrError> {
        self.guard(ObjectAction::Delete)?;
        self.pending_delete = true;
        Ok(())
    }

    /// Record that a repository persisted the pending changes
    pub fn finish_save(&mut self) {
        if self.pending_delete {
            self.pending_delete = false;
            self.deleted = true;
        } else {
            self.head_seq = Some(self.snapshot.meta.seq);
        }
        self.pending.clear();
        self.pending_content = false;
    }

    fn guard(&self, action: ObjectAction) -> Result<(), MdrError> {
        if self.is_historical() {
            return Err(MdrError::validation(format!(
                "{} {} version {} is a historical snapshot and cannot be changed",
                P::KIND,
                self.uid,
                self.version()
            )));
        }
        if self.deleted || self.pending_delete {
            return Err(MdrError::NotFound {
                entity_kind: P::KIND.to_string(),
                uid: self.uid.clone(),
            });
        }
        lifecycle::ensure_allowed(
            action,
            self.status(),
            self.has_final_ancestor,
            P::KIND,
            &self.uid,
        )
        .map(|_| ())
    }

    fn append(
        &mut self,
        action: ObjectAction,
        payload: Option<P>,
        author: &str,
        change_description: Option<String>,
    ) -> Result<(), MdrError> {
        let target = lifecycle::ensure_allowed(
            action,
            self.status(),
            self.has_final_ancestor,
            P::KIND,
            &self.uid,
        )?
        .ok_or_else(|| MdrError::Internal {
            reason: format!("{} has no target status", action),
        })?;

        let start = next_start(self.snapshot.meta.start_date);
        let next = VersionSnapshot {
            meta: VersionMetadata {
                seq: self.snapshot.meta.seq + 1,
                version: lifecycle::next_version(action, self.version()),
                status: target,
                start_date: start,
                end_date: None,
                author: author.to_string(),
                change_description,
            },
            payload: payload.unwrap_or_else(|| self.snapshot.payload.clone()),
        };

        if let Some(last) = self.pending.last_mut() {
            last.meta.end_date = Some(start);
        }
        if target == LibraryItemStatus::Final {
            self.has_final_ancestor = true;
        }
        self.pending.push(next.clone());
        self.snapshot = next;
        Ok(())
    }
}

/// Start of the next snapshot: now, but strictly after the previous start
fn next_start(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_micros();
    let floor = previous + Duration::microseconds(1);
    if now < floor {
        floor
    } else {
        now
    }
}
