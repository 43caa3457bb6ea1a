//! Study lease table
//!
//! Leases live in the database so that separate processes sharing one file
//! see the same holder.

use chrono::Duration;
use rusqlite::{params, OptionalExtension, TransactionBehavior};

use super::hydration::{from_micros, to_micros};
use crate::db::Database;
use crate::errors::{from_rusqlite, Result};
use mdr_core::concurrency::{Lease, LeaseStore};
use mdr_core::errors::MdrError;
use mdr_core::model::metadata::now_micros;

/// SQLite-backed [`LeaseStore`]
#[derive(Clone)]
pub struct SqliteLeaseStore {
    db: Database,
}

impl SqliteLeaseStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn read_lease(conn: &rusqlite::Connection, scope: &str) -> Result<Option<Lease>> {
    let row = conn
        .query_row(
            "SELECT lease_id, holder, acquired_at, expires_at FROM study_leases WHERE scope = ?1",
            [scope],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()
        .map_err(from_rusqlite)?;

    match row {
        Some((lease_id, holder, acquired_at, expires_at)) => Ok(Some(Lease {
            lease_id,
            scope: scope.to_string(),
            holder,
            acquired_at: from_micros(acquired_at)?,
            expires_at: from_micros(expires_at)?,
        })),
        None => Ok(None),
    }
}

impl LeaseStore for SqliteLeaseStore {
    fn acquire(&self, scope: &str, holder: &str, ttl: Duration) -> Result<Lease> {
        self.db.with_conn(|conn| {
            let tx = conn
                .transaction_with_behavior(TransactionBehavior::Immediate)
                .map_err(from_rusqlite)?;

            if let Some(existing) = read_lease(&tx, scope)? {
                if !existing.is_expired_at(now_micros()) {
                    return Err(MdrError::ResourceLocked {
                        scope: scope.to_string(),
                        holder: existing.holder,
                    }
                    .into());
                }
                tracing::warn!(
                    scope = scope,
                    stale_holder = %existing.holder,
                    "taking over expired lease"
                );
            }

            let lease = Lease::new(scope, holder, ttl);
            tx.execute(
                "INSERT INTO study_leases (scope, lease_id, holder, acquired_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(scope) DO UPDATE SET
                     lease_id = excluded.lease_id,
                     holder = excluded.holder,
                     acquired_at = excluded.acquired_at,
                     expires_at = excluded.expires_at",
                params![
                    lease.scope,
                    lease.lease_id,
                    lease.holder,
                    to_micros(lease.acquired_at),
                    to_micros(lease.expires_at),
                ],
            )
            .map_err(from_rusqlite)?;
            tx.commit().map_err(from_rusqlite)?;
            Ok(lease)
        })
    }

    fn release(&self, lease: &Lease) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "DELETE FROM study_leases WHERE scope = ?1 AND lease_id = ?2",
                params![lease.scope, lease.lease_id],
            )
            .map_err(from_rusqlite)?;
            Ok(())
        })
    }

    fn current(&self, scope: &str) -> Result<Option<Lease>> {
        self.db.with_conn(|conn| read_lease(conn, scope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdr_core::errors::ExErrorKind;

    fn store() -> SqliteLeaseStore {
        SqliteLeaseStore::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_live_lease_blocks_other_holder() {
        let store = store();
        let lease = store.acquire("Study_1", "alice", Duration::seconds(60)).unwrap();
        let err = store
            .acquire("Study_1", "bob", Duration::seconds(60))
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::ResourceLocked);

        store.release(&lease).unwrap();
        assert!(store.acquire("Study_1", "bob", Duration::seconds(60)).is_ok());
    }

    #[test]
    fn test_expired_lease_is_taken_over() {
        let store = store();
        store.acquire("Study_1", "alice", Duration::zero()).unwrap();
        let lease = store.acquire("Study_1", "bob", Duration::seconds(60)).unwrap();
        assert_eq!(store.current("Study_1").unwrap().unwrap().holder, "bob");
        assert_eq!(lease.holder, "bob");
    }

    #[test]
    fn test_stale_release_keeps_new_holder() {
        let store = store();
        let stale = store.acquire("Study_1", "alice", Duration::zero()).unwrap();
        store.acquire("Study_1", "bob", Duration::seconds(60)).unwrap();

        store.release(&stale).unwrap();
        assert_eq!(store.current("Study_1").unwrap().unwrap().holder, "bob");
    }
}
