//! MDR Core - versioned library items
//!
//! This crate provides the semantic kernel of the metadata repository:
//! - Version snapshots, libraries and the concrete entity kinds
//! - The Draft/Final/Retired lifecycle state machine
//! - Optimistic lock tokens and advisory study leases
//! - The generic repository contract with an in-memory backend
//! - The generic service layer with paginated listing
//! - Read-through caching with an admin registry
//! - Error and logging facilities shared by every crate

pub mod cache;
pub mod concurrency;
pub mod errors;
pub mod lifecycle;
pub mod logging_facility;
pub mod model;
pub mod repository;
pub mod retry;
pub mod service;

// Re-export commonly used types
pub use cache::{CacheRegistry, CacheSettings, CachedRepository};
pub use concurrency::{LeaseStore, LockToken};
pub use errors::{ExError, ExErrorKind, MdrError, Result};
pub use model::{
    ActivityConcept, CtTermName, Library, LibraryItem, LibraryItemStatus, ObjectAction,
    ObjectiveTemplate, Payload, StudySelection, Version,
};
pub use repository::{GenericRepository, LibraryRepository, VersionSelector};
pub use service::{GenericService, ItemView, ListQuery, Page, ServiceSettings};
