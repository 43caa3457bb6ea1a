pub mod item;
pub mod kinds;
pub mod library;
pub mod metadata;
pub mod version;

pub use item::{LibraryItem, VersionSnapshot};
pub use kinds::{ActivityConcept, CtTermName, ObjectiveTemplate, Payload, StudySelection};
pub use library::Library;
pub use metadata::VersionMetadata;
pub use version::{LibraryItemStatus, ObjectAction, Version};
