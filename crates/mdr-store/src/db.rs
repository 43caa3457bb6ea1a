//! Database connection management
//!
//! Provides utilities for opening SQLite connections and the shared
//! [`Database`] handle the repositories use.

use crate::errors::{from_rusqlite, io_error, Result};
use crate::migrations::apply_migrations;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mdr_core::errors::{ExError, ExErrorKind};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a SQLite database at the given path
pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| io_error("create_db_dir", e))?;
        }
    }
    Connection::open(path).map_err(from_rusqlite)
}

/// Open an in-memory SQLite database (for testing)
pub fn open_in_memory() -> Result<Connection> {
    Connection::open_in_memory().map_err(from_rusqlite)
}

/// Configure a connection with optimal settings
pub fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON")
        .map_err(from_rusqlite)?;

    // journal_mode returns a row, so it goes through query_row
    let _mode: String = conn
        .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
        .map_err(from_rusqlite)?;

    conn.busy_timeout(BUSY_TIMEOUT).map_err(from_rusqlite)?;
    Ok(())
}

/// Shared, thread-safe handle on one configured connection
///
/// Repositories of every entity kind share one handle; each operation holds
/// the connection for its whole transaction.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open, configure and migrate a file database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = open(path)?;
        Self::from_connection(conn)
    }

    /// Open, configure and migrate an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        configure(&conn)?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` with exclusive access to the connection
    pub fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().map_err(|_| {
            ExError::new(ExErrorKind::Internal).with_message("database connection lock poisoned")
        })?;
        f(&mut *conn)
    }
}
