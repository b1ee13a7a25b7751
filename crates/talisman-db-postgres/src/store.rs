//! PostgreSQL implementation of the artifact store contract.
//!
//! Every operation is a single SQL statement over the shared
//! `artifact_store` table. Expiry is enforced as a read-time filter
//! (`expires_at IS NULL OR expires_at > NOW()`) so writes stay O(1) and
//! bulk removal belongs to the purge query. Same-row write conflicts are
//! serialized by PostgreSQL's row-level locking; this layer adds no
//! locking of its own.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use tracing::{debug, info};

use talisman_storage::{
    ArtifactKind, ArtifactStore, DynArtifactStore, IndexedFields, StorageAdapter, StorageError,
    StorageResult,
};

use crate::config::PostgresConfig;
use crate::error::Result;
use crate::pool;
use crate::schema;

/// Maps a query-level sqlx failure into the abstraction error.
fn storage_err(err: sqlx_core::error::Error) -> StorageError {
    StorageError::database(err.to_string())
}

// =============================================================================
// Adapter
// =============================================================================

/// PostgreSQL storage adapter.
///
/// Owns the process-wide connection pool and hands out kind-scoped store
/// handles sharing it. Constructed once at startup by the adapter factory.
#[derive(Debug, Clone)]
pub struct PostgresAdapter {
    pool: PgPool,
}

impl PostgresAdapter {
    /// Connects to PostgreSQL and prepares the adapter.
    ///
    /// This will:
    /// 1. Create the bounded connection pool
    /// 2. Verify connectivity (`SELECT 1`)
    /// 3. Bootstrap the artifact schema
    ///
    /// The returned adapter is fully initialized; none of these steps is
    /// deferred to the first operation.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be created, the probe fails, or
    /// the schema bootstrap fails. All of these are fatal for startup.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = pool::create_pool(config).await?;
        pool::test_connection(&pool).await?;
        schema::ensure_schema(&pool).await?;

        info!(url = %config.display_url(), "Connected to PostgreSQL artifact store");

        Ok(Self { pool })
    }

    /// Creates an adapter from an existing connection pool.
    ///
    /// The connectivity probe and schema bootstrap are not run; the caller
    /// is responsible for having done so.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl StorageAdapter for PostgresAdapter {
    fn store(&self, kind: ArtifactKind) -> DynArtifactStore {
        Arc::new(PostgresArtifactStore {
            pool: self.pool.clone(),
            kind,
        })
    }

    async fn purge_expired(&self) -> StorageResult<u64> {
        let result = query(
            r#"
            DELETE FROM artifact_store
            WHERE expires_at IS NOT NULL
              AND expires_at < NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        debug!(purged = result.rows_affected(), "Purged expired artifacts");
        Ok(result.rows_affected())
    }

    async fn shutdown(&self) {
        self.pool.close().await;
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

// =============================================================================
// Kind-scoped store
// =============================================================================

/// Kind-scoped artifact store over the shared table.
///
/// The bound kind is written on insert and drives indexed-column
/// derivation; primary and secondary lookups resolve against the whole
/// table since ids are globally unique.
pub struct PostgresArtifactStore {
    pool: PgPool,
    kind: ArtifactKind,
}

impl PostgresArtifactStore {
    async fn fetch_payload(
        &self,
        sql: &str,
        key: &str,
    ) -> StorageResult<Option<Value>> {
        let row: Option<(Value,)> = query_as(sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.map(|(payload,)| payload))
    }
}

#[async_trait]
impl ArtifactStore for PostgresArtifactStore {
    fn kind(&self) -> ArtifactKind {
        self.kind
    }

    async fn find(&self, id: &str) -> StorageResult<Option<Value>> {
        self.fetch_payload(
            r#"
            SELECT payload FROM artifact_store
            WHERE id = $1
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
            id,
        )
        .await
    }

    async fn find_by_uid(&self, uid: &str) -> StorageResult<Option<Value>> {
        self.fetch_payload(
            r#"
            SELECT payload FROM artifact_store
            WHERE uid = $1
              AND (expires_at IS NULL OR expires_at > NOW())
            LIMIT 1
            "#,
            uid,
        )
        .await
    }

    async fn find_by_user_code(&self, user_code: &str) -> StorageResult<Option<Value>> {
        self.fetch_payload(
            r#"
            SELECT payload FROM artifact_store
            WHERE user_code = $1
              AND (expires_at IS NULL OR expires_at > NOW())
            LIMIT 1
            "#,
            user_code,
        )
        .await
    }

    async fn upsert(
        &self,
        id: &str,
        payload: &Value,
        expires_in: Option<u64>,
    ) -> StorageResult<()> {
        let fields = IndexedFields::extract(self.kind, payload);
        let ttl_secs = expires_in.map(|secs| secs as f64);

        // expires_at is computed against the database clock so that the
        // read-time visibility filter compares like with like. A NULL TTL
        // propagates through make_interval and leaves expires_at NULL.
        // kind is written at creation only; ON CONFLICT does not touch it.
        query(
            r#"
            INSERT INTO artifact_store
                (id, kind, payload, grant_id, uid, user_code, expires_at)
            VALUES
                ($1, $2, $3, $4, $5, $6,
                 NOW() + make_interval(secs => $7::double precision))
            ON CONFLICT (id) DO UPDATE
            SET payload = EXCLUDED.payload,
                grant_id = EXCLUDED.grant_id,
                uid = EXCLUDED.uid,
                user_code = EXCLUDED.user_code,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(id)
        .bind(self.kind.as_str())
        .bind(payload)
        .bind(fields.grant_id)
        .bind(fields.uid)
        .bind(fields.user_code)
        .bind(ttl_secs)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn consume(&self, id: &str) -> StorageResult<()> {
        // Targeted merge-patch inside a single UPDATE: no application-level
        // read-modify-write, so a racing upsert cannot lose the marker.
        // The consumed_at guard makes a second consume a no-op.
        query(
            r#"
            UPDATE artifact_store
            SET payload = jsonb_set(
                    payload,
                    '{consumed}',
                    to_jsonb(EXTRACT(EPOCH FROM NOW())::bigint)
                ),
                consumed_at = NOW()
            WHERE id = $1
              AND consumed_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn destroy(&self, id: &str) -> StorageResult<()> {
        query("DELETE FROM artifact_store WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    async fn destroy_by_grant(&self, grant_id: &str) -> StorageResult<()> {
        query("DELETE FROM artifact_store WHERE grant_id = $1")
            .bind(grant_id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    async fn find_client_by_jwks_uri(&self, jwks_uri: &str) -> StorageResult<Option<Value>> {
        let row: Option<(Value,)> = query_as(
            r#"
            SELECT payload FROM artifact_store
            WHERE kind = $1
              AND payload->>'jwks_uri' = $2
              AND (expires_at IS NULL OR expires_at > NOW())
            LIMIT 1
            "#,
        )
        .bind(ArtifactKind::Client.as_str())
        .bind(jwks_uri)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|(payload,)| payload))
    }
}
