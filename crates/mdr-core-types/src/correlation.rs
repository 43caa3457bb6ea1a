//! Correlation types for request tracking
//!
//! Every inbound operation carries a [`RequestContext`]: the request-handling
//! layer constructs one per request and passes it down to services, which use
//! it for log correlation and as the source of the `author` stamped on every
//! version snapshot.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Time-ordered identifier of one request, echoed in logs and errors
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is asking, and under which request id
///
/// Built by the caller, borrowed by the service for the duration of the call.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: RequestId,
    /// Authenticated user identifier, recorded as the author of transitions
    pub author: String,
}

impl RequestContext {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            author: author.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_ids_are_unique_and_time_ordered() {
        let first = RequestId::new();
        let second = RequestId::new();

        assert_ne!(first, second);
        assert!(first.as_str() < second.as_str());
    }

    #[test]
    fn test_request_context_carries_author() {
        let ctx = RequestContext::new("jdoe");
        assert_eq!(ctx.author, "jdoe");
        assert_eq!(ctx.request_id.to_string(), ctx.request_id.as_str());
    }

    #[test]
    fn test_request_id_serializes_as_bare_string() {
        let id: RequestId = serde_json::from_str("\"req-1\"").unwrap();
        assert_eq!(id.as_str(), "req-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"req-1\"");
    }
}
