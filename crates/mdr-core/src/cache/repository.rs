use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::hash::Hash;

use super::registry::{CacheAdmin, CacheStoreInfo};
use super::{CacheSettings, STORE_BY_PROJECT_NUMBER, STORE_BY_STUDY_UID, STORE_BY_UID};
use crate::errors::ExError;
use crate::model::{LibraryItem, LibraryItemStatus, Payload};
use crate::repository::{GenericRepository, VersionSelector};

fn build_cache<K, V>(settings: &CacheSettings) -> Cache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(settings.max_capacity)
        .time_to_live(settings.time_to_live)
        .eviction_policy(EvictionPolicy::lru())
        .build()
}

fn store_info<V>(
    repository: &str,
    store_name: &str,
    cache: &Cache<String, V>,
    include_keys: bool,
) -> CacheStoreInfo
where
    V: Clone + Send + Sync + 'static,
{
    cache.run_pending_tasks();
    let keys = include_keys.then(|| {
        let mut keys: Vec<String> = cache.iter().map(|(k, _)| k.as_ref().clone()).collect();
        keys.sort();
        keys
    });
    CacheStoreInfo {
        repository: repository.to_string(),
        store_name: store_name.to_string(),
        size: cache.entry_count(),
        keys,
    }
}

/// Read-through cache in front of a [`GenericRepository`]
///
/// Only `Latest` lookups and the study/project listings are cached.
pub struct CachedRepository<P: Payload, R> {
    name: String,
    inner: R,
    by_uid: Cache<String, LibraryItem<P>>,
    by_study_uid: Cache<String, Vec<LibraryItem<P>>>,
    by_project_number: Cache<String, Vec<LibraryItem<P>>>,
}

impl<P, R> CachedRepository<P, R>
where
    P: Payload,
    R: GenericRepository<P>,
{
    pub fn new(inner: R, settings: CacheSettings) -> Self {
        Self {
            name: format!("{}Repository", P::KIND),
            inner,
            by_uid: build_cache(&settings),
            by_study_uid: build_cache(&settings),
            by_project_number: build_cache(&settings),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    fn invalidate_payload(&self, payload: &P) {
        if let Some(study_uid) = payload.study_uid() {
            self.by_study_uid.invalidate(study_uid);
        }
        if let Some(project_number) = payload.project_number() {
            self.by_project_number.invalidate(project_number);
        }
    }
}

impl<P, R> GenericRepository<P> for CachedRepository<P, R>
where
    P: Payload,
    R: GenericRepository<P>,
{
    fn find_by_uid(
        &self,
        uid: &str,
        selector: &VersionSelector,
    ) -> Result<Option<LibraryItem<P>>, ExError> {
        if !selector.is_latest() {
            return self.inner.find_by_uid(uid, selector);
        }
        if let Some(hit) = self.by_uid.get(uid) {
            return Ok(Some(hit));
        }
        let found = self.inner.find_by_uid(uid, selector)?;
        if let Some(item) = &found {
            self.by_uid.insert(uid.to_string(), item.clone());
        }
        Ok(found)
    }

    fn find_all(
        &self,
        status: Option<LibraryItemStatus>,
        library_name: Option<&str>,
    ) -> Result<Vec<LibraryItem<P>>, ExError> {
        self.inner.find_all(status, library_name)
    }

    fn get_all_versions(&self, uid: &str) -> Result<Vec<LibraryItem<P>>, ExError> {
        self.inner.get_all_versions(uid)
    }

    fn find_releases(&self, uid: &str) -> Result<Vec<LibraryItem<P>>, ExError> {
        self.inner.find_releases(uid)
    }

    fn save(&self, item: &mut LibraryItem<P>) -> Result<(), ExError> {
        let previous = match item.head_seq() {
            Some(_) => self.inner.find_by_uid(item.uid(), &VersionSelector::Latest)?,
            None => None,
        };

        let result = self.inner.save(item);

        self.by_uid.invalidate(item.uid());
        if let Some(previous) = &previous {
            self.invalidate_payload(previous.payload());
        }
        self.invalidate_payload(item.payload());
        result
    }

    fn check_exists_by_name(&self, name: &str) -> Result<bool, ExError> {
        self.inner.check_exists_by_name(name)
    }

    fn check_exists_by_name_in_library(
        &self,
        name: &str,
        library_name: &str,
        exclude_uid: Option<&str>,
    ) -> Result<bool, ExError> {
        self.inner
            .check_exists_by_name_in_library(name, library_name, exclude_uid)
    }

    fn check_exists_final_version(&self, uid: &str) -> Result<bool, ExError> {
        self.inner.check_exists_final_version(uid)
    }

    fn generate_uid(&self) -> Result<String, ExError> {
        self.inner.generate_uid()
    }

    fn find_all_by_study_uid(&self, study_uid: &str) -> Result<Vec<LibraryItem<P>>, ExError> {
        if let Some(hit) = self.by_study_uid.get(study_uid) {
            return Ok(hit);
        }
        let items = self.inner.find_all_by_study_uid(study_uid)?;
        self.by_study_uid
            .insert(study_uid.to_string(), items.clone());
        Ok(items)
    }

    fn find_all_by_project_number(
        &self,
        project_number: &str,
    ) -> Result<Vec<LibraryItem<P>>, ExError> {
        if let Some(hit) = self.by_project_number.get(project_number) {
            return Ok(hit);
        }
        let items = self.inner.find_all_by_project_number(project_number)?;
        self.by_project_number
            .insert(project_number.to_string(), items.clone());
        Ok(items)
    }
}

impl<P, R> CacheAdmin for CachedRepository<P, R>
where
    P: Payload,
    R: GenericRepository<P>,
{
    fn repository_name(&self) -> &str {
        &self.name
    }

    fn cache_info(&self, include_keys: bool) -> Vec<CacheStoreInfo> {
        vec![
            store_info(&self.name, STORE_BY_UID, &self.by_uid, include_keys),
            store_info(&self.name, STORE_BY_STUDY_UID, &self.by_study_uid, include_keys),
            store_info(
                &self.name,
                STORE_BY_PROJECT_NUMBER,
                &self.by_project_number,
                include_keys,
            ),
        ]
    }

    fn clear(&self) {
        self.by_uid.invalidate_all();
        self.by_study_uid.invalidate_all();
        self.by_project_number.invalidate_all();
        self.by_uid.run_pending_tasks();
        self.by_study_uid.run_pending_tasks();
        self.by_project_number.run_pending_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Library, ObjectiveTemplate, StudySelection};
    use crate::repository::{InMemoryLibraryRepository, InMemoryRepository};
    use std::sync::Arc;

    fn cached<P: Payload>() -> CachedRepository<P, InMemoryRepository<P>> {
        let libraries = InMemoryLibraryRepository::with_libraries([
            Library::new("Sponsor", true),
            Library::new("Studies", true),
        ]);
        CachedRepository::new(
            InMemoryRepository::new(Arc::new(libraries)),
            CacheSettings::default(),
        )
    }

    fn uid_store_size<P: Payload, R: GenericRepository<P>>(repo: &CachedRepository<P, R>) -> u64 {
        repo.cache_info(false)
            .into_iter()
            .find(|i| i.store_name == STORE_BY_UID)
            .map(|i| i.size)
            .unwrap_or(0)
    }

    #[test]
    fn test_latest_lookup_is_cached_and_save_invalidates() {
        let repo = cached::<ObjectiveTemplate>();
        let mut item = LibraryItem::create(
            repo.generate_uid().unwrap(),
            Library::new("Sponsor", true),
            ObjectiveTemplate::new("Obj A"),
            "alice",
            None,
        )
        .unwrap();
        repo.save(&mut item).unwrap();

        let first = repo
            .find_by_uid(item.uid(), &VersionSelector::Latest)
            .unwrap()
            .unwrap();
        assert_eq!(uid_store_size(&repo), 1);

        let mut editable = first.clone();
        editable
            .edit(ObjectiveTemplate::new("Obj B"), "alice", None)
            .unwrap();
        repo.save(&mut editable).unwrap();
        assert_eq!(uid_store_size(&repo), 0);

        let refreshed = repo
            .find_by_uid(item.uid(), &VersionSelector::Latest)
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.payload().name, "Obj B");
    }

    #[test]
    fn test_study_listing_invalidated_on_save() {
        let repo = cached::<StudySelection>();
        let selection = |selected: &str| StudySelection {
            study_uid: "Study_000001".to_string(),
            project_number: "P1".to_string(),
            selected_uid: selected.to_string(),
            order: 1,
        };
        let mut a = LibraryItem::create(
            repo.generate_uid().unwrap(),
            Library::new("Studies", true),
            selection("ObjectiveTemplate_000001"),
            "alice",
            None,
        )
        .unwrap();
        repo.save(&mut a).unwrap();
        assert_eq!(repo.find_all_by_study_uid("Study_000001").unwrap().len(), 1);

        let mut b = LibraryItem::create(
            repo.generate_uid().unwrap(),
            Library::new("Studies", true),
            selection("ObjectiveTemplate_000002"),
            "alice",
            None,
        )
        .unwrap();
        repo.save(&mut b).unwrap();
        assert_eq!(repo.find_all_by_study_uid("Study_000001").unwrap().len(), 2);
        assert_eq!(repo.find_all_by_project_number("P1").unwrap().len(), 2);
    }

    #[test]
    fn test_clear_empties_all_stores() {
        let repo = cached::<ObjectiveTemplate>();
        let mut item = LibraryItem::create(
            repo.generate_uid().unwrap(),
            Library::new("Sponsor", true),
            ObjectiveTemplate::new("Obj A"),
            "alice",
            None,
        )
        .unwrap();
        repo.save(&mut item).unwrap();
        repo.find_by_uid(item.uid(), &VersionSelector::Latest)
            .unwrap();

        let info = repo.cache_info(true);
        assert_eq!(info.len(), 3);
        assert_eq!(
            info[0].keys.as_deref(),
            Some(&[item.uid().to_string()][..])
        );

        repo.clear();
        assert!(repo.cache_info(false).iter().all(|i| i.size == 0));
    }
}
