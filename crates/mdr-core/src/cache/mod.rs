//! Caching layer
//!
//! [`CachedRepository`] decorates any [`GenericRepository`] with three bounded
//! caches. A successful `save` invalidates rather than updates entries, so the
//! next read always refreshes from the source of truth.
//!
//! [`GenericRepository`]: crate::repository::GenericRepository

pub mod registry;
pub mod repository;

pub use registry::{CacheAdmin, CacheRegistry, CacheStoreInfo};
pub use repository::CachedRepository;

use std::time::Duration;

pub const STORE_BY_UID: &str = "cache_store_item_by_uid";
pub const STORE_BY_STUDY_UID: &str = "cache_store_item_by_study_uid";
pub const STORE_BY_PROJECT_NUMBER: &str = "cache_store_item_by_project_number";

/// Bounds applied to each cache store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub max_capacity: u64,
    pub time_to_live: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_capacity: 1000,
            time_to_live: Duration::from_secs(3600),
        }
    }
}
