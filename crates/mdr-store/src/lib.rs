//! MDR Store - SQLite persistence
//!
//! Provides:
//! - Connection handling and a shared [`Database`] handle
//! - Embedded, checksummed schema migrations
//! - `SqliteRepository<P>` implementing the generic repository contract
//! - Library registry and advisory study lease tables

pub mod db;
pub mod errors;
pub mod migrations;
pub mod repo;

// Re-export key types
pub use db::Database;
pub use errors::Result;
pub use repo::{SqliteLeaseStore, SqliteLibraryRepository, SqliteRepository};
