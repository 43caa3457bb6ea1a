use mdr_core_types::RequestId;
use thiserror::Error;

/// Result type alias using MdrError
pub type Result<T> = std::result::Result<T, MdrError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable for programmatic handling,
/// test assertions and responses produced by the request-handling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Lookup
    NotFound,

    // Lifecycle
    InvalidStateTransition,
    LibraryNotEditable,
    DuplicateNaturalKey,

    // Concurrency
    ConcurrentModification,
    ResourceLocked,

    // Input
    Validation,

    // Infrastructure
    Persistence,
    Serialization,
    Io,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::InvalidStateTransition => "ERR_INVALID_STATE_TRANSITION",
            ExErrorKind::LibraryNotEditable => "ERR_LIBRARY_NOT_EDITABLE",
            ExErrorKind::DuplicateNaturalKey => "ERR_DUPLICATE_NATURAL_KEY",
            ExErrorKind::ConcurrentModification => "ERR_CONCURRENT_MODIFICATION",
            ExErrorKind::ResourceLocked => "ERR_RESOURCE_LOCKED",
            ExErrorKind::Validation => "ERR_VALIDATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Whether a caller may retry automatically after this kind of failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExErrorKind::ConcurrentModification | ExErrorKind::ResourceLocked
        )
    }
}

/// Canonical structured error type
///
/// Carries the classification used for programmatic handling plus the
/// entity-kind/uid/operation context attached as the error travels up.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_kind: Option<String>,
    uid: Option<String>,
    request_id: Option<RequestId>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_kind: None,
            uid: None,
            request_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity kind context
    pub fn with_entity_kind(mut self, kind: impl Into<String>) -> Self {
        self.entity_kind = Some(kind.into());
        self
    }

    /// Add uid context
    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    /// Add request ID context
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Fill in operation context without overwriting what a lower layer set
    pub fn or_context(mut self, op: &str, entity_kind: &str, uid: Option<&str>) -> Self {
        if self.op.is_none() {
            self.op = Some(op.to_string());
        }
        if self.entity_kind.is_none() {
            self.entity_kind = Some(entity_kind.to_string());
        }
        if self.uid.is_none() {
            self.uid = uid.map(str::to_string);
        }
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the entity kind context, if any
    pub fn entity_kind(&self) -> Option<&str> {
        self.entity_kind.as_deref()
    }

    /// Get the uid context, if any
    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(kind) = &self.entity_kind {
            write!(f, " (entity_kind: {})", kind)?;
        }
        if let Some(uid) = &self.uid {
            write!(f, " (uid: {})", uid)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Domain error taxonomy for metadata repository operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MdrError {
    /// No aggregate root with this uid
    #[error("{entity_kind} not found: {uid}")]
    NotFound { entity_kind: String, uid: String },

    /// The root exists but no snapshot matches the selector
    #[error("{entity_kind} {uid} has no snapshot matching {selector}")]
    SnapshotNotFound {
        entity_kind: String,
        uid: String,
        selector: String,
    },

    /// Operation is not in the possible-actions set of the current status
    #[error("Cannot {action} {entity_kind} {uid} in status {status}")]
    InvalidStateTransition {
        entity_kind: String,
        uid: String,
        status: String,
        action: String,
    },

    /// Create/edit against a locked library
    #[error("Library {library} is not editable")]
    LibraryNotEditable { library: String },

    /// Library name does not resolve
    #[error("Library not found: {library}")]
    LibraryNotFound { library: String },

    /// Library name already registered
    #[error("Library already exists: {library}")]
    LibraryAlreadyExists { library: String },

    /// Natural key already used by a Draft/Final item in the library
    #[error("{entity_kind} with key '{key}' already exists in library {library}")]
    DuplicateNaturalKey {
        entity_kind: String,
        key: String,
        library: String,
    },

    /// The current version pointer moved since the caller read it
    #[error("{entity_kind} {uid} was modified concurrently (expected {expected}, found {actual})")]
    ConcurrentModification {
        entity_kind: String,
        uid: String,
        expected: String,
        actual: String,
    },

    /// Advisory lease already held
    #[error("{scope} is locked by {holder}")]
    ResourceLocked { scope: String, holder: String },

    /// Malformed input detected before touching persistence
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Persistence error: {reason}")]
    Persistence { reason: String },

    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    #[error("Internal error: {reason}")]
    Internal { reason: String },
}

impl MdrError {
    pub fn validation(reason: impl Into<String>) -> Self {
        MdrError::Validation {
            reason: reason.into(),
        }
    }
}

impl From<MdrError> for ExError {
    fn from(err: MdrError) -> Self {
        let message = err.to_string();
        match err {
            MdrError::NotFound { entity_kind, uid }
            | MdrError::SnapshotNotFound {
                entity_kind, uid, ..
            } => ExError::new(ExErrorKind::NotFound)
                .with_entity_kind(entity_kind)
                .with_uid(uid)
                .with_message(message),

            MdrError::InvalidStateTransition {
                entity_kind,
                uid,
                action,
                ..
            } => ExError::new(ExErrorKind::InvalidStateTransition)
                .with_entity_kind(entity_kind)
                .with_uid(uid)
                .with_op(action)
                .with_message(message),

            MdrError::LibraryNotEditable { .. } => {
                ExError::new(ExErrorKind::LibraryNotEditable).with_message(message)
            }

            MdrError::LibraryNotFound { .. }
            | MdrError::LibraryAlreadyExists { .. }
            | MdrError::Validation { .. } => {
                ExError::new(ExErrorKind::Validation).with_message(message)
            }

            MdrError::DuplicateNaturalKey { entity_kind, .. } => {
                ExError::new(ExErrorKind::DuplicateNaturalKey)
                    .with_entity_kind(entity_kind)
                    .with_message(message)
            }

            MdrError::ConcurrentModification {
                entity_kind, uid, ..
            } => ExError::new(ExErrorKind::ConcurrentModification)
                .with_entity_kind(entity_kind)
                .with_uid(uid)
                .with_message(message),

            MdrError::ResourceLocked { .. } => {
                ExError::new(ExErrorKind::ResourceLocked).with_message(message)
            }

            MdrError::Persistence { .. } => {
                ExError::new(ExErrorKind::Persistence).with_message(message)
            }

            MdrError::Serialization { .. } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            MdrError::Internal { .. } => ExError::new(ExErrorKind::Internal).with_message(message),
        }
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Serialization).with_message(err.to_string())
    }
}
