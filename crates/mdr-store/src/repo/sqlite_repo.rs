//! SQLite-backed [`GenericRepository`]
//!
//! One table pair serves every entity kind: `item_roots` holds the current
//! pointer, `item_versions` the append-only snapshot log. `save` runs as a
//! single `BEGIN IMMEDIATE` transaction, so the lock-token check and the
//! writes cannot interleave with another writer, in this process or another.

use std::marker::PhantomData;

use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

use super::hydration::{to_micros, RootRow, SnapshotRow, ROOT_COLUMNS, ROOT_WIDTH, VERSION_COLUMNS};
use crate::db::Database;
use crate::errors::{from_rusqlite, Result};
use mdr_core::concurrency::{check_lock_token, LockToken};
use mdr_core::errors::{ExError, MdrError};
use mdr_core::model::{LibraryItem, LibraryItemStatus, Payload, VersionSnapshot};
use mdr_core::repository::{
    ensure_library_editable, format_uid, GenericRepository, VersionSelector,
};

/// Repository of one entity kind over the shared [`Database`]
pub struct SqliteRepository<P: Payload> {
    db: Database,
    _kind: PhantomData<fn() -> P>,
}

impl<P: Payload> Clone for SqliteRepository<P> {
    fn clone(&self) -> Self {
        Self::new(self.db.clone())
    }
}

impl<P: Payload> SqliteRepository<P> {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            _kind: PhantomData,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Current items matching an extra predicate on the current snapshot
    fn current_where(
        &self,
        predicate: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<LibraryItem<P>>> {
        let sql = format!(
            "SELECT {ROOT_COLUMNS}, {VERSION_COLUMNS}
             FROM item_roots r
             JOIN libraries l ON l.name = r.library_name
             JOIN item_versions v ON v.kind = r.kind AND v.uid = r.uid AND v.seq = r.current_seq
             WHERE r.kind = ?1 AND {predicate}
             ORDER BY r.uid"
        );
        self.db.with_conn(|conn| {
            let kind: &str = P::KIND;
            let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&kind];
            bound.extend_from_slice(args);
            let mut stmt = conn.prepare(&sql).map_err(from_rusqlite)?;
            let rows = stmt
                .query_map(bound.as_slice(), |row| {
                    Ok((RootRow::from_row(row)?, SnapshotRow::from_row(row, ROOT_WIDTH)?))
                })
                .map_err(from_rusqlite)?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(from_rusqlite)?;
            rows.into_iter()
                .map(|(root, snap)| Ok(root.view(snap.into_snapshot::<P>()?)))
                .collect()
        })
    }
}

fn load_root(conn: &Connection, kind: &str, uid: &str) -> Result<Option<RootRow>> {
    conn.query_row(
        &format!(
            "SELECT {ROOT_COLUMNS} FROM item_roots r
             JOIN libraries l ON l.name = r.library_name
             WHERE r.kind = ?1 AND r.uid = ?2"
        ),
        params![kind, uid],
        RootRow::from_row,
    )
    .optional()
    .map_err(from_rusqlite)
}

/// Snapshot log of one root in ascending seq order
fn load_log<P: Payload>(conn: &Connection, uid: &str) -> Result<Vec<VersionSnapshot<P>>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {VERSION_COLUMNS} FROM item_versions v
             WHERE v.kind = ?1 AND v.uid = ?2
             ORDER BY v.seq"
        ))
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map(params![P::KIND, uid], |row| SnapshotRow::from_row(row, 0))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    rows.into_iter().map(SnapshotRow::into_snapshot).collect()
}

fn key_in_use(
    conn: &Connection,
    kind: &str,
    key: &str,
    library_name: Option<&str>,
    exclude_uid: Option<&str>,
) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(
             SELECT 1 FROM item_versions v
             JOIN item_roots r ON r.kind = v.kind AND r.uid = v.uid
             WHERE v.kind = ?1
               AND v.end_date IS NULL
               AND v.status != 'Retired'
               AND v.natural_key = ?2
               AND (?3 IS NULL OR r.library_name = ?3)
               AND (?4 IS NULL OR v.uid != ?4)
         )",
        params![kind, key, library_name, exclude_uid],
        |row| row.get(0),
    )
    .map_err(from_rusqlite)
}

fn insert_snapshot<P: Payload>(
    tx: &Transaction<'_>,
    uid: &str,
    snapshot: &VersionSnapshot<P>,
) -> Result<()> {
    let meta = &snapshot.meta;
    let payload = serde_json::to_string(&snapshot.payload).map_err(ExError::from)?;
    tx.execute(
        "INSERT INTO item_versions (
             kind, uid, seq, major, minor, status, start_date, end_date,
             author, change_description, natural_key, study_uid, project_number, payload
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            P::KIND,
            uid,
            meta.seq as i64,
            meta.version.major,
            meta.version.minor,
            meta.status.as_str(),
            to_micros(meta.start_date),
            meta.end_date.map(to_micros),
            meta.author,
            meta.change_description,
            snapshot.payload.natural_key(),
            snapshot.payload.study_uid(),
            snapshot.payload.project_number(),
            payload,
        ],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}

impl<P: Payload> GenericRepository<P> for SqliteRepository<P> {
    fn find_by_uid(
        &self,
        uid: &str,
        selector: &VersionSelector,
    ) -> Result<Option<LibraryItem<P>>> {
        self.db.with_conn(|conn| {
            let root = match load_root(conn, P::KIND, uid)? {
                Some(root) => root,
                None => return Ok(None),
            };
            let log = load_log::<P>(conn, uid)?;
            Ok(selector
                .select(&log)
                .map(|snapshot| root.view(snapshot.clone())))
        })
    }

    fn find_all(
        &self,
        status: Option<LibraryItemStatus>,
        library_name: Option<&str>,
    ) -> Result<Vec<LibraryItem<P>>> {
        let status = status.map(|s| s.as_str());
        self.current_where(
            "(?2 IS NULL OR v.status = ?2) AND (?3 IS NULL OR r.library_name = ?3)",
            &[&status, &library_name],
        )
    }

    fn get_all_versions(&self, uid: &str) -> Result<Vec<LibraryItem<P>>> {
        self.db.with_conn(|conn| {
            let root = match load_root(conn, P::KIND, uid)? {
                Some(root) => root,
                None => return Ok(Vec::new()),
            };
            let log = load_log::<P>(conn, uid)?;
            Ok(log.into_iter().rev().map(|s| root.view(s)).collect())
        })
    }

    fn save(&self, item: &mut LibraryItem<P>) -> Result<()> {
        if item.pending().is_empty() && !item.is_pending_delete() {
            return Ok(());
        }

        self.db.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(from_rusqlite)?;

            let root = load_root(&tx, P::KIND, item.uid())?;
            check_lock_token(
                P::KIND,
                item.uid(),
                Some(item.lock_token().unwrap_or(LockToken(0))),
                Some(LockToken(root.as_ref().map_or(0, |r| r.current_seq))),
            )?;

            if item.is_pending_delete() {
                if let Some(root) = root {
                    let current_status: String = tx
                        .query_row(
                            "SELECT status FROM item_versions
                             WHERE kind = ?1 AND uid = ?2 AND seq = ?3",
                            params![P::KIND, item.uid(), root.current_seq as i64],
                            |row| row.get(0),
                        )
                        .map_err(from_rusqlite)?;
                    if root.has_final || current_status != LibraryItemStatus::Draft.as_str() {
                        return Err(MdrError::InvalidStateTransition {
                            entity_kind: P::KIND.to_string(),
                            uid: item.uid().to_string(),
                            status: current_status,
                            action: "delete".to_string(),
                        }
                        .into());
                    }
                    tx.execute(
                        "DELETE FROM item_roots WHERE kind = ?1 AND uid = ?2",
                        params![P::KIND, item.uid()],
                    )
                    .map_err(from_rusqlite)?;
                }
                tx.commit().map_err(from_rusqlite)?;
                return Ok(());
            }

            let (first_start, opening) = match (item.pending().first(), item.pending().last()) {
                (Some(first), Some(last)) => (first.meta.start_date, last),
                _ => return Ok(()),
            };
            if item.needs_editable_library() {
                let name = &item.library().name;
                let is_editable: Option<bool> = tx
                    .query_row(
                        "SELECT is_editable FROM libraries WHERE name = ?1",
                        [name],
                        |row| row.get(0),
                    )
                    .optional()
                    .map_err(from_rusqlite)?;
                ensure_library_editable(name, is_editable)?;
            }
            if opening.meta.status != LibraryItemStatus::Retired {
                let key = opening.payload.natural_key();
                let library = &item.library().name;
                if key_in_use(&tx, P::KIND, &key, Some(library), Some(item.uid()))? {
                    return Err(MdrError::DuplicateNaturalKey {
                        entity_kind: P::KIND.to_string(),
                        key,
                        library: library.clone(),
                    }
                    .into());
                }
            }

            tx.execute(
                "INSERT INTO item_roots (kind, uid, library_name, current_seq, has_final)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(kind, uid) DO UPDATE SET
                     current_seq = excluded.current_seq,
                     has_final = MAX(has_final, excluded.has_final)",
                params![
                    P::KIND,
                    item.uid(),
                    item.library().name,
                    opening.meta.seq as i64,
                    item.has_final_ancestor(),
                ],
            )
            .map_err(from_rusqlite)?;

            tx.execute(
                "UPDATE item_versions SET end_date = ?3
                 WHERE kind = ?1 AND uid = ?2 AND end_date IS NULL",
                params![P::KIND, item.uid(), to_micros(first_start)],
            )
            .map_err(from_rusqlite)?;

            for snapshot in item.pending() {
                insert_snapshot(&tx, item.uid(), snapshot)?;
            }

            tx.commit().map_err(from_rusqlite)
        })?;

        item.finish_save();
        Ok(())
    }

    fn check_exists_by_name(&self, name: &str) -> Result<bool> {
        self.db
            .with_conn(|conn| key_in_use(conn, P::KIND, name, None, None))
    }

    fn check_exists_by_name_in_library(
        &self,
        name: &str,
        library_name: &str,
        exclude_uid: Option<&str>,
    ) -> Result<bool> {
        self.db.with_conn(|conn| {
            key_in_use(conn, P::KIND, name, Some(library_name), exclude_uid)
        })
    }

    fn check_exists_final_version(&self, uid: &str) -> Result<bool> {
        self.db.with_conn(|conn| {
            Ok(load_root(conn, P::KIND, uid)?.is_some_and(|root| root.has_final))
        })
    }

    fn generate_uid(&self) -> Result<String> {
        self.db.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(from_rusqlite)?;
            let uid = loop {
                tx.execute(
                    "INSERT INTO uid_counters (kind, counter) VALUES (?1, 1)
                     ON CONFLICT(kind) DO UPDATE SET counter = counter + 1",
                    [P::KIND],
                )
                .map_err(from_rusqlite)?;
                let counter: i64 = tx
                    .query_row(
                        "SELECT counter FROM uid_counters WHERE kind = ?1",
                        [P::KIND],
                        |row| row.get(0),
                    )
                    .map_err(from_rusqlite)?;
                let candidate = format_uid(P::UID_PREFIX, counter as u64);
                if load_root(&tx, P::KIND, &candidate)?.is_none() {
                    break candidate;
                }
            };
            tx.commit().map_err(from_rusqlite)?;
            Ok(uid)
        })
    }

    fn find_all_by_study_uid(&self, study_uid: &str) -> Result<Vec<LibraryItem<P>>> {
        self.current_where("v.study_uid = ?2", &[&study_uid])
    }

    fn find_all_by_project_number(&self, project_number: &str) -> Result<Vec<LibraryItem<P>>> {
        self.current_where("v.project_number = ?2", &[&project_number])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::SqliteLibraryRepository;
    use mdr_core::model::{Library, ObjectiveTemplate};
    use mdr_core::repository::LibraryRepository;

    fn repo() -> SqliteRepository<ObjectiveTemplate> {
        let db = Database::open_in_memory().unwrap();
        SqliteLibraryRepository::new(db.clone())
            .create_library(&Library::new("Sponsor", true))
            .unwrap();
        SqliteRepository::new(db)
    }

    fn create(repo: &SqliteRepository<ObjectiveTemplate>, name: &str) -> LibraryItem<ObjectiveTemplate> {
        let uid = repo.generate_uid().unwrap();
        let mut item = LibraryItem::create(
            uid,
            Library::new("Sponsor", true),
            ObjectiveTemplate::new(name),
            "alice",
            None,
        )
        .unwrap();
        repo.save(&mut item).unwrap();
        item
    }

    #[test]
    fn test_generate_uid_is_sequential() {
        let repo = repo();
        assert_eq!(repo.generate_uid().unwrap(), "ObjectiveTemplate_000001");
        assert_eq!(repo.generate_uid().unwrap(), "ObjectiveTemplate_000002");
    }

    #[test]
    fn test_save_then_find_returns_saved_state() {
        let repo = repo();
        let item = create(&repo, "Obj A");

        let found = repo
            .find_by_uid(item.uid(), &VersionSelector::Latest)
            .unwrap()
            .unwrap();
        assert_eq!(found.snapshot(), item.snapshot());
        assert_eq!(found.lock_token(), item.lock_token());
        assert_eq!(found.library(), item.library());
    }

    #[test]
    fn test_save_twice_is_idempotent() {
        let repo = repo();
        let mut item = create(&repo, "Obj A");
        repo.save(&mut item).unwrap();
        assert_eq!(repo.get_all_versions(item.uid()).unwrap().len(), 1);
    }

    #[test]
    fn test_edit_closes_previous_snapshot() {
        let repo = repo();
        let item = create(&repo, "Obj A");
        let mut loaded = repo
            .find_by_uid(item.uid(), &VersionSelector::Latest)
            .unwrap()
            .unwrap();
        loaded
            .edit(ObjectiveTemplate::new("Obj B"), "bob", Some("rename".into()))
            .unwrap();
        repo.save(&mut loaded).unwrap();

        let versions = repo.get_all_versions(item.uid()).unwrap();
        assert_eq!(versions.len(), 2);
        assert!(versions[0].meta().end_date.is_none());
        assert_eq!(versions[1].meta().end_date, Some(versions[0].meta().start_date));
    }

    #[test]
    fn test_find_all_filters_by_status() {
        let repo = repo();
        let a = create(&repo, "Obj A");
        create(&repo, "Obj B");
        let mut loaded = repo
            .find_by_uid(a.uid(), &VersionSelector::Latest)
            .unwrap()
            .unwrap();
        loaded.approve("alice", None).unwrap();
        repo.save(&mut loaded).unwrap();

        let finals = repo.find_all(Some(LibraryItemStatus::Final), None).unwrap();
        assert_eq!(finals.len(), 1);
        assert_eq!(finals[0].uid(), a.uid());
        assert_eq!(repo.find_all(None, Some("Sponsor")).unwrap().len(), 2);
        assert!(repo.find_all(None, Some("CDISC")).unwrap().is_empty());
    }

    #[test]
    fn test_name_check_ignores_excluded_uid() {
        let repo = repo();
        let item = create(&repo, "Obj A");
        assert!(repo.check_exists_by_name("Obj A").unwrap());
        assert!(!repo
            .check_exists_by_name_in_library("Obj A", "Sponsor", Some(item.uid()))
            .unwrap());
    }

    #[test]
    fn test_edit_after_library_locked_is_rejected_at_save() {
        let db = Database::open_in_memory().unwrap();
        let libraries = SqliteLibraryRepository::new(db.clone());
        libraries
            .create_library(&Library::new("Sponsor", true))
            .unwrap();
        let repo = SqliteRepository::<ObjectiveTemplate>::new(db);
        let item = create(&repo, "Obj A");
        let mut loaded = repo
            .find_by_uid(item.uid(), &VersionSelector::Latest)
            .unwrap()
            .unwrap();

        libraries.set_editable("Sponsor", false).unwrap();
        loaded
            .edit(ObjectiveTemplate::new("Obj B"), "alice", None)
            .unwrap();
        let err = repo.save(&mut loaded).unwrap_err();

        assert_eq!(err.code(), "ERR_LIBRARY_NOT_EDITABLE");
        assert_eq!(repo.get_all_versions(item.uid()).unwrap().len(), 1);

        let mut approving = repo
            .find_by_uid(item.uid(), &VersionSelector::Latest)
            .unwrap()
            .unwrap();
        approving.approve("alice", None).unwrap();
        assert!(repo.save(&mut approving).is_ok());
    }
}
