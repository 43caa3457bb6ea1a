//! Database migrations
//!
//! Embedded SQL migrations with checksum validation

mod checksums;
mod embedded;
mod runner;

pub use runner::{applied_migrations, apply_migrations, AppliedMigration};
