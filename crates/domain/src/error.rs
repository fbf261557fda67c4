//! Domain error types.

use common::Canceled;
use thiserror::Error;

use crate::table::{TableError, ValidationError};

/// Coarse classification callers map to transport-specific codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The referenced entity does not exist.
    NotFound,
    /// Input or state precondition violated.
    Invalid,
    /// The context was cancelled or its deadline passed.
    Canceled,
    /// Anything else, e.g. a storage or driver failure.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "ENOTFOUND",
            ErrorKind::Invalid => "EINVALID",
            ErrorKind::Canceled => "ECANCELED",
            ErrorKind::Unknown => "EUNKNOWN",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during table operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A table transition was rejected.
    #[error(transparent)]
    Table(#[from] TableError),

    /// The aggregate failed validation before a write.
    #[error("invalid aggregate: {0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Canceled(#[from] Canceled),

    /// A storage failure that could not be classified further.
    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        DomainError::NotFound(message.into())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        DomainError::Invalid(message.into())
    }

    pub fn storage(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        DomainError::Storage {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Table(err) => err.kind(),
            DomainError::Validation(_) | DomainError::Invalid(_) => ErrorKind::Invalid,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::Canceled(_) => ErrorKind::Canceled,
            DomainError::Storage { .. } => ErrorKind::Unknown,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_invalid(&self) -> bool {
        self.kind() == ErrorKind::Invalid
    }

    pub fn is_canceled(&self) -> bool {
        self.kind() == ErrorKind::Canceled
    }
}

/// Result type for domain operations.
pub type Result<T, E = DomainError> = std::result::Result<T, E>;
