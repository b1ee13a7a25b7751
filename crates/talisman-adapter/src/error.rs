//! Error types for adapter selection and startup.

use talisman_db_postgres::PostgresError;

/// Errors raised while selecting and initializing a storage backend.
///
/// Every variant is fatal: the process must not proceed to serve traffic,
/// and no local recovery is attempted.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The configured backend kind is recognized but not available in this
    /// build.
    #[error("Unsupported backend kind: {kind}")]
    UnsupportedBackend { kind: String },

    /// The selected backend failed to start (connectivity, schema).
    #[error("Storage startup failed: {0}")]
    Startup(#[from] PostgresError),
}

impl AdapterError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a new unsupported-backend error.
    #[must_use]
    pub fn unsupported(kind: impl Into<String>) -> Self {
        Self::UnsupportedBackend { kind: kind.into() }
    }
}
