//! Storage error types for the artifact storage abstraction layer.

use std::fmt;

/// Errors that can occur during artifact storage operations.
///
/// A missing record is not an error for find-style operations (they return
/// `Ok(None)`) and is a silent no-op for destroy-style operations; the
/// `NotFound` variant exists for callers that need to convert an absent
/// result into a failure of their own.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested artifact was not found.
    #[error("Artifact not found: {kind}/{id}")]
    NotFound {
        /// The artifact kind that was looked up.
        kind: String,
        /// The id that was looked up.
        id: String,
    },

    /// The payload document is malformed for the requested operation.
    #[error("Invalid payload: {message}")]
    InvalidPayload {
        /// Description of why the payload is invalid.
        message: String,
    },

    /// Failed to reach the storage backend.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The backend reported a query-level failure.
    #[error("Database error: {message}")]
    Database {
        /// Description of the database error.
        message: String,
    },

    /// Payload serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Creates a new `InvalidPayload` error.
    #[must_use]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `Database` error.
    #[must_use]
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }

    /// Returns `true` if the failure is safe to retry at the caller level.
    ///
    /// Upsert, consume, destroy, and grant-cascade are idempotent, so a
    /// caller may re-apply them after an infrastructure failure and reach
    /// the same end state.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Database { .. })
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::InvalidPayload { .. } => ErrorCategory::Validation,
            Self::Connection { .. } => ErrorCategory::Infrastructure,
            Self::Database { .. } => ErrorCategory::Database,
            Self::Serialization(_) => ErrorCategory::Internal,
        }
    }
}

/// Categories of storage errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Artifact not found.
    NotFound,
    /// Validation error.
    Validation,
    /// Infrastructure/connection error.
    Infrastructure,
    /// Query-level database error.
    Database,
    /// Internal error.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Validation => write!(f, "validation"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Database => write!(f, "database"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
