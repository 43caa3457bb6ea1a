//! Explicit application context
//!
//! Every service, repository and cache lives here and is passed by
//! reference; nothing is held in process globals.

use std::sync::Arc;

use mdr_core::concurrency::LeaseStore;
use mdr_core::errors::ExError;
use mdr_core::model::{ActivityConcept, CtTermName, ObjectiveTemplate, Payload, StudySelection};
use mdr_core::retry::RetryPolicy;
use mdr_core::{CacheRegistry, CachedRepository, GenericService, LibraryRepository};
use mdr_store::{Database, SqliteLeaseStore, SqliteLibraryRepository, SqliteRepository};

use crate::config::MdrConfig;

/// Repository stack used for every kind: moka caches over SQLite
pub type CachedSqlite<P> = CachedRepository<P, SqliteRepository<P>>;

/// Service for one kind over [`CachedSqlite`]
pub type KindService<P> = GenericService<P, CachedSqlite<P>>;

pub struct MdrContext {
    db: Database,
    libraries: Arc<SqliteLibraryRepository>,
    caches: CacheRegistry,
    retry: RetryPolicy,
    pub objective_templates: KindService<ObjectiveTemplate>,
    pub ct_terms: KindService<CtTermName>,
    pub activities: KindService<ActivityConcept>,
    pub study_selections: KindService<StudySelection>,
}

impl MdrContext {
    /// Open the configured database (migrating it) and wire every service
    pub fn open(config: &MdrConfig) -> Result<Self, ExError> {
        config.validate()?;
        let db = if config.is_in_memory() {
            Database::open_in_memory()?
        } else {
            Database::open(&config.database.path)?
        };
        Ok(Self::with_database(db, config))
    }

    /// Wire services over an already opened database
    pub fn with_database(db: Database, config: &MdrConfig) -> Self {
        let libraries = Arc::new(SqliteLibraryRepository::new(db.clone()));
        let leases: Arc<dyn LeaseStore> = Arc::new(SqliteLeaseStore::new(db.clone()));
        let caches = CacheRegistry::new();

        Self {
            objective_templates: kind_service(&db, &libraries, &leases, &caches, config),
            ct_terms: kind_service(&db, &libraries, &leases, &caches, config),
            activities: kind_service(&db, &libraries, &leases, &caches, config),
            study_selections: kind_service(&db, &libraries, &leases, &caches, config),
            db,
            libraries,
            caches,
            retry: config.retry_policy(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn libraries(&self) -> &dyn LibraryRepository {
        self.libraries.as_ref()
    }

    pub fn caches(&self) -> &CacheRegistry {
        &self.caches
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

fn kind_service<P: Payload>(
    db: &Database,
    libraries: &Arc<SqliteLibraryRepository>,
    leases: &Arc<dyn LeaseStore>,
    caches: &CacheRegistry,
    config: &MdrConfig,
) -> KindService<P> {
    let repo = Arc::new(CachedRepository::new(
        SqliteRepository::<P>::new(db.clone()),
        config.cache_settings(),
    ));
    caches.register(repo.clone());
    GenericService::new(
        repo,
        libraries.clone(),
        leases.clone(),
        config.service_settings(),
    )
}
