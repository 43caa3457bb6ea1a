use std::sync::Arc;

use mdr_core::concurrency::InMemoryLeaseStore;
use mdr_core::repository::{InMemoryLibraryRepository, InMemoryRepository};
use mdr_core::{GenericService, Library, ObjectiveTemplate, Payload, ServiceSettings};
use mdr_core_types::RequestContext;

pub type TemplateService =
    GenericService<ObjectiveTemplate, InMemoryRepository<ObjectiveTemplate>>;

/// Editable library used by most tests
#[allow(dead_code)]
pub const SPONSOR: &str = "Sponsor";

/// Non-editable library
#[allow(dead_code)]
pub const CDISC: &str = "CDISC";

/// Library repository seeded with one editable and one locked library
#[allow(dead_code)]
pub fn libraries() -> Arc<InMemoryLibraryRepository> {
    Arc::new(InMemoryLibraryRepository::with_libraries([
        Library::new(SPONSOR, true),
        Library::new(CDISC, false),
        Library::new("Studies", true),
    ]))
}

/// Service for any kind over a fresh in-memory repository
#[allow(dead_code)]
pub fn service_for<P: Payload>() -> GenericService<P, InMemoryRepository<P>> {
    let libraries = libraries();
    GenericService::new(
        Arc::new(InMemoryRepository::new(libraries.clone())),
        libraries,
        Arc::new(InMemoryLeaseStore::new()),
        ServiceSettings::default(),
    )
}

#[allow(dead_code)]
pub fn template_service() -> TemplateService {
    service_for::<ObjectiveTemplate>()
}

#[allow(dead_code)]
pub fn ctx(author: &str) -> RequestContext {
    RequestContext::new(author)
}
