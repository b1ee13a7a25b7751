//! Schema bootstrap for the PostgreSQL storage backend.
//!
//! All artifact kinds share the single `artifact_store` table; the payload
//! is a JSONB document and the remaining columns are derived at upsert
//! time for indexed lookup and expiry-driven cleanup.

use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result};

/// The shared artifact table name.
pub const TABLE: &str = "artifact_store";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS artifact_store (
    id          TEXT PRIMARY KEY,
    kind        TEXT NOT NULL,
    payload     JSONB NOT NULL,
    grant_id    TEXT,
    uid         TEXT,
    user_code   TEXT,
    expires_at  TIMESTAMPTZ,
    consumed_at TIMESTAMPTZ
)
"#;

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS artifact_store_grant_id_idx
         ON artifact_store (grant_id) WHERE grant_id IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS artifact_store_uid_idx
         ON artifact_store (uid) WHERE uid IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS artifact_store_user_code_idx
         ON artifact_store (user_code) WHERE user_code IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS artifact_store_expires_at_idx
         ON artifact_store (expires_at) WHERE expires_at IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS artifact_store_client_jwks_uri_idx
         ON artifact_store ((payload->>'jwks_uri')) WHERE kind = 'Client'",
];

/// Ensures the artifact table and its indexes exist.
///
/// Idempotent; safe to run on every startup.
///
/// # Errors
///
/// Returns an error if any DDL statement fails.
#[instrument(skip(pool))]
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx_core::query::query(CREATE_TABLE)
        .execute(pool)
        .await
        .map_err(PostgresError::from)?;

    for statement in CREATE_INDEXES {
        sqlx_core::query::query(statement)
            .execute(pool)
            .await
            .map_err(PostgresError::from)?;
    }

    info!(table = TABLE, "Artifact schema ready");
    Ok(())
}
