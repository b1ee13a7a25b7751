//! PostgreSQL storage backend for the Talisman identity provider.
//!
//! Implements the `talisman-storage` contract over a single shared JSONB
//! table, using sqlx for queries.
//!
//! # Example
//!
//! ```ignore
//! use talisman_db_postgres::{PostgresAdapter, PostgresConfig};
//! use talisman_storage::{ArtifactKind, StorageAdapter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PostgresConfig::new("localhost", "idp", "secret", "talisman")
//!     .with_pool_size(10);
//!
//! let adapter = PostgresAdapter::connect(&config).await?;
//!
//! let sessions = adapter.store(ArtifactKind::Session);
//! let payload = serde_json::json!({ "uid": "sess-1", "account": "user-7" });
//! sessions.upsert("s-1", &payload, Some(3600)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`config`]: configuration types for the backend
//! - [`error`]: startup error types
//! - [`pool`]: connection pool management
//! - [`schema`]: schema bootstrap (table, indexes)
//! - [`store`]: the `ArtifactStore` / `StorageAdapter` implementation

mod config;
mod error;
mod pool;
mod schema;
mod store;

// Re-export main types
pub use config::{DEFAULT_PORT, PostgresConfig};
pub use error::{PostgresError, Result};
pub use pool::{PgPoolOptions, create_pool, test_connection};
pub use schema::ensure_schema;
pub use store::{PostgresAdapter, PostgresArtifactStore};

/// PostgreSQL connection pool type alias.
pub type PgPool = sqlx_postgres::PgPool;

// Re-export storage traits for convenience
pub use talisman_storage::{ArtifactKind, ArtifactStore, StorageAdapter, StorageError};
