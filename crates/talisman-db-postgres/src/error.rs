//! Error types for the PostgreSQL storage backend.

/// Errors specific to the PostgreSQL storage backend's startup path.
///
/// Runtime query failures are surfaced through
/// [`talisman_storage::StorageError`] instead; this type covers pool
/// construction, the connectivity probe, and schema bootstrap, all of which
/// are fatal for the process.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] sqlx_core::error::Error),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type alias for PostgreSQL startup operations.
pub type Result<T> = std::result::Result<T, PostgresError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PostgresError::config("invalid host");
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("invalid host"));
    }
}
