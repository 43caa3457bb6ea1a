use std::path::Path;
use std::sync::Arc;

use mdr_core::repository::LibraryRepository;
use mdr_core::{GenericService, Library, Payload, ServiceSettings};
use mdr_core_types::RequestContext;
use mdr_store::{Database, SqliteLeaseStore, SqliteLibraryRepository, SqliteRepository};

#[allow(dead_code)]
pub const SPONSOR: &str = "Sponsor";

#[allow(dead_code)]
pub const CDISC: &str = "CDISC";

pub type SqliteService<P> = GenericService<P, SqliteRepository<P>>;

/// Seed the standard libraries once per database file
#[allow(dead_code)]
pub fn seed_libraries(db: &Database) {
    let libraries = SqliteLibraryRepository::new(db.clone());
    for library in [
        Library::new(SPONSOR, true),
        Library::new(CDISC, false),
        Library::new("Studies", true),
    ] {
        if !libraries.library_exists(&library.name).unwrap() {
            libraries.create_library(&library).unwrap();
        }
    }
}

#[allow(dead_code)]
pub fn open_file_db(path: &Path) -> Database {
    let db = Database::open(path).unwrap();
    seed_libraries(&db);
    db
}

#[allow(dead_code)]
pub fn memory_db() -> Database {
    let db = Database::open_in_memory().unwrap();
    seed_libraries(&db);
    db
}

/// Service for any kind over the given database
#[allow(dead_code)]
pub fn service_for<P: Payload>(db: &Database) -> SqliteService<P> {
    GenericService::new(
        Arc::new(SqliteRepository::new(db.clone())),
        Arc::new(SqliteLibraryRepository::new(db.clone())),
        Arc::new(SqliteLeaseStore::new(db.clone())),
        ServiceSettings::default(),
    )
}

#[allow(dead_code)]
pub fn ctx(author: &str) -> RequestContext {
    RequestContext::new(author)
}
