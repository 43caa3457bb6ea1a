//! Advisory per-study write lease
//!
//! A lease is an explicit record (holder, acquired-at, expiry, scope) rather
//! than a flag on shared state, so staleness is detectable: a lease past its
//! `expires_at` may be taken over by another holder.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::errors::{ExError, ExErrorKind, MdrError};
use crate::model::metadata::now_micros;

/// An advisory lease held on one scope (a study uid)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub lease_id: String,
    pub scope: String,
    pub holder: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn new(scope: &str, holder: &str, ttl: Duration) -> Self {
        let acquired_at = now_micros();
        Self {
            lease_id: Uuid::now_v7().to_string(),
            scope: scope.to_string(),
            holder: holder.to_string(),
            acquired_at,
            expires_at: acquired_at + ttl,
        }
    }

    pub fn is_expired_at(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.expires_at
    }
}

/// Storage of lease records
pub trait LeaseStore: Send + Sync {
    /// Take the lease on `scope`, or fail with `ResourceLocked` if a live
    /// lease is held. Never blocks.
    fn acquire(&self, scope: &str, holder: &str, ttl: Duration) -> Result<Lease, ExError>;

    /// Release `lease` if it is still the one recorded for its scope
    fn release(&self, lease: &Lease) -> Result<(), ExError>;

    /// Live or expired lease currently recorded for `scope`
    fn current(&self, scope: &str) -> Result<Option<Lease>, ExError>;
}

/// Process-local lease store
#[derive(Debug, Default)]
pub struct InMemoryLeaseStore {
    leases: Mutex<HashMap<String, Lease>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> ExError {
    ExError::new(ExErrorKind::Internal).with_message("lease table lock poisoned")
}

impl LeaseStore for InMemoryLeaseStore {
    fn acquire(&self, scope: &str, holder: &str, ttl: Duration) -> Result<Lease, ExError> {
        let mut leases = self.leases.lock().map_err(|_| poisoned())?;
        if let Some(existing) = leases.get(scope) {
            if !existing.is_expired_at(now_micros()) {
                return Err(MdrError::ResourceLocked {
                    scope: scope.to_string(),
                    holder: existing.holder.clone(),
                }
                .into());
            }
            tracing::warn!(
                scope = scope,
                stale_holder = %existing.holder,
                "taking over expired lease"
            );
        }
        let lease = Lease::new(scope, holder, ttl);
        leases.insert(scope.to_string(), lease.clone());
        Ok(lease)
    }

    fn release(&self, lease: &Lease) -> Result<(), ExError> {
        let mut leases = self.leases.lock().map_err(|_| poisoned())?;
        if leases
            .get(&lease.scope)
            .is_some_and(|held| held.lease_id == lease.lease_id)
        {
            leases.remove(&lease.scope);
        }
        Ok(())
    }

    fn current(&self, scope: &str) -> Result<Option<Lease>, ExError> {
        let leases = self.leases.lock().map_err(|_| poisoned())?;
        Ok(leases.get(scope).cloned())
    }
}

/// Releases its lease when dropped, including on unwind
pub struct LeaseGuard<'a> {
    store: &'a dyn LeaseStore,
    lease: Option<Lease>,
}

impl<'a> LeaseGuard<'a> {
    pub fn acquire(
        store: &'a dyn LeaseStore,
        scope: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<Self, ExError> {
        let lease = store.acquire(scope, holder, ttl)?;
        Ok(Self {
            store,
            lease: Some(lease),
        })
    }

    pub fn lease(&self) -> Option<&Lease> {
        self.lease.as_ref()
    }

    /// Release now, surfacing any store error
    pub fn release(mut self) -> Result<(), ExError> {
        match self.lease.take() {
            Some(lease) => self.store.release(&lease),
            None => Ok(()),
        }
    }
}

impl Drop for LeaseGuard<'_> {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            if let Err(err) = self.store.release(&lease) {
                tracing::warn!(scope = %lease.scope, err_code = err.code(), "lease release failed");
            }
        }
    }
}
