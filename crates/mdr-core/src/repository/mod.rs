//! Generic repository contract
//!
//! One capability set, implemented once per storage backend and checked at
//! compile time for every entity kind through the [`Payload`] bound.

pub mod memory;
pub mod selector;

pub use memory::{InMemoryLibraryRepository, InMemoryRepository};
pub use selector::VersionSelector;

use crate::errors::{ExError, MdrError};
use crate::model::{Library, LibraryItem, LibraryItemStatus, Payload};

/// Persistence contract for one aggregate-root kind
pub trait GenericRepository<P: Payload>: Send + Sync {
    /// Resolve one snapshot of the root `uid`
    fn find_by_uid(
        &self,
        uid: &str,
        selector: &VersionSelector,
    ) -> Result<Option<LibraryItem<P>>, ExError>;

    /// Current versions, optionally filtered by status and library
    fn find_all(
        &self,
        status: Option<LibraryItemStatus>,
        library_name: Option<&str>,
    ) -> Result<Vec<LibraryItem<P>>, ExError>;

    /// Full history, newest first
    fn get_all_versions(&self, uid: &str) -> Result<Vec<LibraryItem<P>>, ExError>;

    /// Final and Retired snapshots, newest first
    fn find_releases(&self, uid: &str) -> Result<Vec<LibraryItem<P>>, ExError> {
        Ok(self
            .get_all_versions(uid)?
            .into_iter()
            .filter(|item| item.status() != LibraryItemStatus::Draft)
            .collect())
    }

    /// Persist the item's pending snapshots or pending delete atomically
    ///
    /// Fails with `ConcurrentModification` when the current pointer moved
    /// since the item was read, `DuplicateNaturalKey` when the snapshot to be
    /// opened collides with another live item. Saving an item with nothing
    /// pending is a no-op.
    fn save(&self, item: &mut LibraryItem<P>) -> Result<(), ExError>;

    /// Whether any non-retired current version uses `name` as natural key
    fn check_exists_by_name(&self, name: &str) -> Result<bool, ExError>;

    /// Library-scoped form of [`check_exists_by_name`](Self::check_exists_by_name)
    fn check_exists_by_name_in_library(
        &self,
        name: &str,
        library_name: &str,
        exclude_uid: Option<&str>,
    ) -> Result<bool, ExError>;

    /// Whether `uid` ever had a Final snapshot
    fn check_exists_final_version(&self, uid: &str) -> Result<bool, ExError>;

    /// Next never-used uid for this kind
    fn generate_uid(&self) -> Result<String, ExError>;

    fn find_all_by_study_uid(&self, study_uid: &str) -> Result<Vec<LibraryItem<P>>, ExError> {
        Ok(self
            .find_all(None, None)?
            .into_iter()
            .filter(|item| item.payload().study_uid() == Some(study_uid))
            .collect())
    }

    fn find_all_by_project_number(
        &self,
        project_number: &str,
    ) -> Result<Vec<LibraryItem<P>>, ExError> {
        Ok(self
            .find_all(None, None)?
            .into_iter()
            .filter(|item| item.payload().project_number() == Some(project_number))
            .collect())
    }
}

/// Library lookup and registration
pub trait LibraryRepository: Send + Sync {
    fn find_library(&self, name: &str) -> Result<Option<Library>, ExError>;

    fn library_exists(&self, name: &str) -> Result<bool, ExError> {
        Ok(self.find_library(name)?.is_some())
    }

    fn create_library(&self, library: &Library) -> Result<(), ExError>;

    fn list_libraries(&self) -> Result<Vec<Library>, ExError>;

    /// Lock or unlock a library for create and edit
    fn set_editable(&self, name: &str, is_editable: bool) -> Result<(), ExError>;
}

/// Save-time guard for snapshots produced by create or edit
///
/// `is_editable` is the library flag read inside the save transaction,
/// `None` when the library does not exist.
pub fn ensure_library_editable(name: &str, is_editable: Option<bool>) -> Result<(), ExError> {
    match is_editable {
        Some(true) => Ok(()),
        Some(false) => Err(MdrError::LibraryNotEditable {
            library: name.to_string(),
        }
        .into()),
        None => Err(MdrError::LibraryNotFound {
            library: name.to_string(),
        }
        .into()),
    }
}

/// Format a uid from a kind prefix and counter value
pub fn format_uid(prefix: &str, counter: u64) -> String {
    format!("{}_{:06}", prefix, counter)
}
