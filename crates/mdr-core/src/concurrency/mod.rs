//! Optimistic concurrency guard and advisory study leases

pub mod lease;
pub mod lock_token;

pub use lease::{InMemoryLeaseStore, Lease, LeaseGuard, LeaseStore};
pub use lock_token::{check_lock_token, LockToken};
