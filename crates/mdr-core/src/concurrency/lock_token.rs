use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::MdrError;

/// Opaque optimistic-lock token: the sequence of the current snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LockToken(pub u64);

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Compare the caller-observed token against the current pointer
///
/// # Errors
///
/// `ConcurrentModification` when `expected` is set and differs from `actual`.
pub fn check_lock_token(
    entity_kind: &str,
    uid: &str,
    expected: Option<LockToken>,
    actual: Option<LockToken>,
) -> Result<(), MdrError> {
    match expected {
        Some(token) if Some(token) != actual => Err(MdrError::ConcurrentModification {
            entity_kind: entity_kind.to_string(),
            uid: uid.to_string(),
            expected: token.to_string(),
            actual: actual.map_or_else(|| "none".to_string(), |t| t.to_string()),
        }),
        _ => Ok(()),
    }
}
