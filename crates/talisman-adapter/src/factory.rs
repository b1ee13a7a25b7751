//! One-shot backend selection.

use std::sync::Arc;

use tracing::info;

use talisman_db_memory::MemoryAdapter;
use talisman_db_postgres::PostgresAdapter;
use talisman_storage::DynAdapter;

use crate::config::{AdapterConfig, BackendKind};
use crate::error::AdapterError;

/// Selects and initializes the configured storage backend.
///
/// Invoked once at process startup. The returned handle is fully
/// initialized: for the relational backend the pool is built, connectivity
/// verified, and the schema bootstrapped before this function returns.
///
/// # Errors
///
/// Every failure here is fatal for the process:
///
/// - `postgres` selected without a `[postgres]` section,
/// - the relational backend failing its startup sequence,
/// - a backend kind not compiled into this distribution.
pub async fn select_adapter(config: &AdapterConfig) -> Result<DynAdapter, AdapterError> {
    match config.backend {
        BackendKind::Postgres => {
            let pg = config.postgres.as_ref().ok_or_else(|| {
                AdapterError::config(
                    "backend 'postgres' selected but the [postgres] section is missing",
                )
            })?;

            let adapter = PostgresAdapter::connect(pg).await?;
            info!(backend = %config.backend, "Storage adapter ready");
            Ok(Arc::new(adapter))
        }
        BackendKind::Memory => {
            let adapter = MemoryAdapter::new();
            info!(backend = %config.backend, "Storage adapter ready");
            Ok(Arc::new(adapter))
        }
        BackendKind::Mongodb | BackendKind::Dynamodb => {
            Err(AdapterError::unsupported(config.backend.as_str()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use talisman_storage::{ArtifactKind, ArtifactStore, StorageAdapter};

    #[tokio::test]
    async fn test_select_memory_adapter() {
        let adapter = select_adapter(&AdapterConfig::memory()).await.unwrap();
        assert_eq!(adapter.backend_name(), "memory");

        // The handle is immediately usable.
        let store = adapter.store(ArtifactKind::Session);
        store
            .upsert("s-1", &json!({"uid": "u1"}), None)
            .await
            .unwrap();
        assert!(store.find("s-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_postgres_without_section_is_fatal() {
        let config = AdapterConfig {
            backend: BackendKind::Postgres,
            postgres: None,
        };

        let err = select_adapter(&config).await.unwrap_err();
        assert!(matches!(err, AdapterError::Config { .. }));
    }

    #[tokio::test]
    async fn test_uncompiled_backends_fail_fast() {
        for kind in [BackendKind::Mongodb, BackendKind::Dynamodb] {
            let config = AdapterConfig {
                backend: kind,
                postgres: None,
            };

            let err = select_adapter(&config).await.unwrap_err();
            assert!(matches!(err, AdapterError::UnsupportedBackend { .. }));
        }
    }
}
