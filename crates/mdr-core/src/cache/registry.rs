use serde::Serialize;
use std::sync::{Arc, RwLock};

/// Occupancy of one cache store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStoreInfo {
    pub repository: String,
    pub store_name: String,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
}

/// Diagnostic view of a cache owner
pub trait CacheAdmin: Send + Sync {
    fn repository_name(&self) -> &str;

    fn cache_info(&self, include_keys: bool) -> Vec<CacheStoreInfo>;

    fn clear(&self);
}

/// Explicitly constructed set of cache owners
///
/// Diagnostic only: nothing reads through the registry.
#[derive(Default)]
pub struct CacheRegistry {
    members: RwLock<Vec<Arc<dyn CacheAdmin>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, member: Arc<dyn CacheAdmin>) {
        if let Ok(mut members) = self.members.write() {
            members.push(member);
        }
    }

    /// Occupancy of every registered store, sorted by repository then store
    pub fn cache_info(&self, include_keys: bool) -> Vec<CacheStoreInfo> {
        let mut infos: Vec<CacheStoreInfo> = self
            .members
            .read()
            .map(|members| {
                members
                    .iter()
                    .flat_map(|m| m.cache_info(include_keys))
                    .collect()
            })
            .unwrap_or_default();
        infos.sort_by(|a, b| {
            (a.repository.as_str(), a.store_name.as_str())
                .cmp(&(b.repository.as_str(), b.store_name.as_str()))
        });
        infos
    }

    /// Clear every registered cache; returns the number of owners cleared
    pub fn clear_all(&self) -> usize {
        self.members
            .read()
            .map(|members| {
                for member in members.iter() {
                    tracing::debug!(repository = member.repository_name(), "clearing caches");
                    member.clear();
                }
                members.len()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Fake {
        cleared: AtomicBool,
    }

    impl CacheAdmin for Fake {
        fn repository_name(&self) -> &str {
            "FakeRepository"
        }

        fn cache_info(&self, include_keys: bool) -> Vec<CacheStoreInfo> {
            vec![CacheStoreInfo {
                repository: "FakeRepository".to_string(),
                store_name: "store".to_string(),
                size: 1,
                keys: include_keys.then(|| vec!["k".to_string()]),
            }]
        }

        fn clear(&self) {
            self.cleared.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_registry_enumerates_and_clears() {
        let registry = CacheRegistry::new();
        let fake = Arc::new(Fake {
            cleared: AtomicBool::new(false),
        });
        registry.register(fake.clone());

        let infos = registry.cache_info(true);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].keys.as_deref(), Some(&["k".to_string()][..]));
        assert!(registry.cache_info(false)[0].keys.is_none());

        assert_eq!(registry.clear_all(), 1);
        assert!(fake.cleared.load(Ordering::SeqCst));
    }
}
