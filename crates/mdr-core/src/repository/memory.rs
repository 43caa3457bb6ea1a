//! In-memory repository backend
//!
//! The map lock is the transaction boundary: `save` re-reads the current
//! pointer and performs every check and write under one write guard.
//! Roots reference their library by name; the library itself is resolved
//! through the shared [`LibraryRepository`] on every read and save.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::{ensure_library_editable, format_uid, GenericRepository, LibraryRepository, VersionSelector};
use crate::concurrency::{check_lock_token, LockToken};
use crate::errors::{ExError, ExErrorKind, MdrError};
use crate::model::{Library, LibraryItem, LibraryItemStatus, Payload, VersionSnapshot};

fn poisoned() -> ExError {
    ExError::new(ExErrorKind::Internal).with_message("repository lock poisoned")
}

#[derive(Debug, Clone)]
struct Root<P> {
    library_name: String,
    /// Append-only snapshot log in ascending seq order
    log: Vec<VersionSnapshot<P>>,
    has_final: bool,
}

impl<P: Payload> Root<P> {
    fn head(&self) -> Option<&VersionSnapshot<P>> {
        self.log.last()
    }

    fn head_seq(&self) -> u64 {
        self.head().map_or(0, |s| s.meta.seq)
    }

    fn view(&self, uid: &str, library: &Library, snapshot: &VersionSnapshot<P>) -> LibraryItem<P> {
        LibraryItem::hydrate(
            uid.to_string(),
            library.clone(),
            snapshot.clone(),
            self.head_seq(),
            self.has_final,
        )
    }

    fn is_live_with_key(&self, key: &str) -> bool {
        self.head().is_some_and(|s| {
            s.meta.status != LibraryItemStatus::Retired && s.payload.natural_key() == key
        })
    }
}

/// HashMap-backed [`GenericRepository`] for one entity kind
pub struct InMemoryRepository<P: Payload> {
    roots: RwLock<HashMap<String, Root<P>>>,
    counter: AtomicU64,
    libraries: Arc<dyn LibraryRepository>,
}

impl<P: Payload> InMemoryRepository<P> {
    pub fn new(libraries: Arc<dyn LibraryRepository>) -> Self {
        Self {
            roots: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(0),
            libraries,
        }
    }

    /// Number of aggregate roots stored
    pub fn len(&self) -> usize {
        self.roots.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn library(&self, name: &str) -> Result<Library, ExError> {
        self.libraries.find_library(name)?.ok_or_else(|| {
            MdrError::LibraryNotFound {
                library: name.to_string(),
            }
            .into()
        })
    }
}

fn key_in_use<P: Payload>(
    roots: &HashMap<String, Root<P>>,
    key: &str,
    library_name: Option<&str>,
    exclude_uid: Option<&str>,
) -> bool {
    roots.iter().any(|(uid, root)| {
        Some(uid.as_str()) != exclude_uid
            && library_name.map_or(true, |lib| root.library_name == lib)
            && root.is_live_with_key(key)
    })
}

impl<P: Payload> GenericRepository<P> for InMemoryRepository<P> {
    fn find_by_uid(
        &self,
        uid: &str,
        selector: &VersionSelector,
    ) -> Result<Option<LibraryItem<P>>, ExError> {
        let roots = self.roots.read().map_err(|_| poisoned())?;
        let Some(root) = roots.get(uid) else {
            return Ok(None);
        };
        match selector.select(&root.log) {
            Some(snapshot) => Ok(Some(root.view(uid, &self.library(&root.library_name)?, snapshot))),
            None => Ok(None),
        }
    }

    fn find_all(
        &self,
        status: Option<LibraryItemStatus>,
        library_name: Option<&str>,
    ) -> Result<Vec<LibraryItem<P>>, ExError> {
        let libraries: HashMap<String, Library> = self
            .libraries
            .list_libraries()?
            .into_iter()
            .map(|lib| (lib.name.clone(), lib))
            .collect();
        let roots = self.roots.read().map_err(|_| poisoned())?;

        let mut items = Vec::new();
        for (uid, root) in roots.iter() {
            if library_name.is_some_and(|lib| root.library_name != lib) {
                continue;
            }
            let Some(head) = root.head() else { continue };
            if status.is_some_and(|s| head.meta.status != s) {
                continue;
            }
            let library = libraries.get(&root.library_name).ok_or_else(|| {
                ExError::from(MdrError::LibraryNotFound {
                    library: root.library_name.clone(),
                })
            })?;
            items.push(root.view(uid, library, head));
        }
        items.sort_by(|a, b| a.uid().cmp(b.uid()));
        Ok(items)
    }

    fn get_all_versions(&self, uid: &str) -> Result<Vec<LibraryItem<P>>, ExError> {
        let roots = self.roots.read().map_err(|_| poisoned())?;
        let Some(root) = roots.get(uid) else {
            return Ok(Vec::new());
        };
        let library = self.library(&root.library_name)?;
        Ok(root
            .log
            .iter()
            .rev()
            .map(|s| root.view(uid, &library, s))
            .collect())
    }

    fn save(&self, item: &mut LibraryItem<P>) -> Result<(), ExError> {
        if item.pending().is_empty() && !item.is_pending_delete() {
            return Ok(());
        }

        let mut roots = self.roots.write().map_err(|_| poisoned())?;
        let actual = roots.get(item.uid()).map(|root| LockToken(root.head_seq()));
        check_lock_token(
            P::KIND,
            item.uid(),
            Some(item.lock_token().unwrap_or(LockToken(0))),
            Some(actual.unwrap_or(LockToken(0))),
        )?;

        if item.is_pending_delete() {
            if let Some(root) = roots.get(item.uid()) {
                let deletable = !root.has_final
                    && root
                        .head()
                        .is_some_and(|s| s.meta.status == LibraryItemStatus::Draft);
                if !deletable {
                    return Err(MdrError::InvalidStateTransition {
                        entity_kind: P::KIND.to_string(),
                        uid: item.uid().to_string(),
                        status: item.status().to_string(),
                        action: "delete".to_string(),
                    }
                    .into());
                }
                roots.remove(item.uid());
            }
            item.finish_save();
            return Ok(());
        }

        let (first_start, opening) = match (item.pending().first(), item.pending().last()) {
            (Some(first), Some(last)) => (first.meta.start_date, last),
            _ => return Ok(()),
        };
        let library_name = &item.library().name;
        if item.needs_editable_library() {
            let current = self.libraries.find_library(library_name)?;
            ensure_library_editable(library_name, current.map(|lib| lib.is_editable))?;
        }
        if opening.meta.status != LibraryItemStatus::Retired {
            let key = opening.payload.natural_key();
            if key_in_use(&roots, &key, Some(library_name), Some(item.uid())) {
                return Err(MdrError::DuplicateNaturalKey {
                    entity_kind: P::KIND.to_string(),
                    key,
                    library: library_name.clone(),
                }
                .into());
            }
        }

        let root = roots.entry(item.uid().to_string()).or_insert_with(|| Root {
            library_name: library_name.clone(),
            log: Vec::new(),
            has_final: false,
        });
        if let Some(current) = root.log.last_mut() {
            current.meta.end_date = Some(first_start);
        }
        root.log.extend(item.pending().iter().cloned());
        root.has_final |= item.has_final_ancestor();
        item.finish_save();
        Ok(())
    }

    fn check_exists_by_name(&self, name: &str) -> Result<bool, ExError> {
        let roots = self.roots.read().map_err(|_| poisoned())?;
        Ok(key_in_use(&roots, name, None, None))
    }

    fn check_exists_by_name_in_library(
        &self,
        name: &str,
        library_name: &str,
        exclude_uid: Option<&str>,
    ) -> Result<bool, ExError> {
        let roots = self.roots.read().map_err(|_| poisoned())?;
        Ok(key_in_use(&roots, name, Some(library_name), exclude_uid))
    }

    fn check_exists_final_version(&self, uid: &str) -> Result<bool, ExError> {
        let roots = self.roots.read().map_err(|_| poisoned())?;
        Ok(roots.get(uid).is_some_and(|root| root.has_final))
    }

    fn generate_uid(&self) -> Result<String, ExError> {
        let roots = self.roots.read().map_err(|_| poisoned())?;
        loop {
            let next = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            let uid = format_uid(P::UID_PREFIX, next);
            if !roots.contains_key(&uid) {
                return Ok(uid);
            }
        }
    }
}

/// BTreeMap-backed [`LibraryRepository`]
#[derive(Debug, Default)]
pub struct InMemoryLibraryRepository {
    libraries: RwLock<BTreeMap<String, Library>>,
}

impl InMemoryLibraryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_libraries(libraries: impl IntoIterator<Item = Library>) -> Self {
        Self {
            libraries: RwLock::new(
                libraries
                    .into_iter()
                    .map(|lib| (lib.name.clone(), lib))
                    .collect(),
            ),
        }
    }
}

impl LibraryRepository for InMemoryLibraryRepository {
    fn find_library(&self, name: &str) -> Result<Option<Library>, ExError> {
        let libraries = self.libraries.read().map_err(|_| poisoned())?;
        Ok(libraries.get(name).cloned())
    }

    fn create_library(&self, library: &Library) -> Result<(), ExError> {
        let mut libraries = self.libraries.write().map_err(|_| poisoned())?;
        if libraries.contains_key(&library.name) {
            return Err(MdrError::LibraryAlreadyExists {
                library: library.name.clone(),
            }
            .into());
        }
        libraries.insert(library.name.clone(), library.clone());
        Ok(())
    }

    fn list_libraries(&self) -> Result<Vec<Library>, ExError> {
        let libraries = self.libraries.read().map_err(|_| poisoned())?;
        Ok(libraries.values().cloned().collect())
    }

    fn set_editable(&self, name: &str, is_editable: bool) -> Result<(), ExError> {
        let mut libraries = self.libraries.write().map_err(|_| poisoned())?;
        let library = libraries
            .get_mut(name)
            .ok_or_else(|| MdrError::LibraryNotFound {
                library: name.to_string(),
            })?;
        library.is_editable = is_editable;
        Ok(())
    }
}
