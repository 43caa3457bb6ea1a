//! SQLite repository implementations

mod hydration;
pub mod lease;
pub mod library;
pub mod sqlite_repo;

pub use lease::SqliteLeaseStore;
pub use library::SqliteLibraryRepository;
pub use sqlite_repo::SqliteRepository;
