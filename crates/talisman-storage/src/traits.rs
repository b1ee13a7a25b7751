//! Storage traits for the artifact storage abstraction layer.
//!
//! This module defines the core traits that all storage backends must
//! implement.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;
use crate::types::ArtifactKind;

/// Kind-scoped store handle used by the protocol runtime.
///
/// The runtime instantiates one handle per artifact kind and calls these
/// methods directly for every artifact read and write. All handles created
/// by the same [`StorageAdapter`] share its connection pool.
///
/// Every find-style operation filters out records whose expiry has passed;
/// an expired record behaves exactly like an absent one. Implementations
/// must be thread-safe (`Send + Sync`).
///
/// # Example
///
/// ```ignore
/// use talisman_storage::{ArtifactStore, StorageError};
///
/// async fn load_session(store: &dyn ArtifactStore, id: &str) -> Result<serde_json::Value, StorageError> {
///     store
///         .find(id)
///         .await?
///         .ok_or_else(|| StorageError::not_found(store.kind().as_str(), id))
/// }
/// ```
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// The artifact kind this handle was bound to at construction time.
    fn kind(&self) -> ArtifactKind;

    /// Finds an artifact by primary id.
    ///
    /// Returns `None` when no record exists or the record has expired.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing
    /// records.
    async fn find(&self, id: &str) -> StorageResult<Option<Value>>;

    /// Finds at most one artifact by user-session identifier.
    ///
    /// Ties are broken by storage order (first match); expired records are
    /// never returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    async fn find_by_uid(&self, uid: &str) -> StorageResult<Option<Value>>;

    /// Finds at most one artifact by device-flow user code.
    ///
    /// Same semantics as [`find_by_uid`](Self::find_by_uid).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    async fn find_by_user_code(&self, user_code: &str) -> StorageResult<Option<Value>>;

    /// Inserts or fully replaces the artifact at `id`.
    ///
    /// `expires_in` is a TTL in seconds; `None` means the record never
    /// expires. Indexed columns are derived from the payload per the
    /// handle's kind, and a conflicting prior record is replaced
    /// atomically, payload and derived columns alike. The stored kind is
    /// written at creation and never rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails; the caller may retry,
    /// re-applying the upsert yields the same end state.
    async fn upsert(&self, id: &str, payload: &Value, expires_in: Option<u64>)
    -> StorageResult<()>;

    /// Marks a single-use artifact as consumed without deleting it.
    ///
    /// Writes an epoch-seconds `consumed` marker into the payload and
    /// stamps the consumption time, as one targeted merge-patch at the
    /// storage layer; the rest of the payload is untouched. Idempotent: a
    /// second consume leaves the record in the same observable state, and
    /// an absent id is a silent no-op. Does not change expiry or
    /// visibility.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn consume(&self, id: &str) -> StorageResult<()>;

    /// Deletes the artifact at `id` unconditionally.
    ///
    /// Succeeds silently when no such record exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn destroy(&self, id: &str) -> StorageResult<()>;

    /// Deletes every artifact sharing `grant_id`, regardless of kind.
    ///
    /// The group is removed as a set; succeeds silently when nothing
    /// matches.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn destroy_by_grant(&self, grant_id: &str) -> StorageResult<()>;

    /// Finds at most one client registration by its federation key URL.
    ///
    /// This is a document-internal field match restricted to the client
    /// kind, regardless of the kind this handle is bound to. Expired
    /// records are never returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    async fn find_client_by_jwks_uri(&self, jwks_uri: &str) -> StorageResult<Option<Value>>;
}

/// Backend-level handle produced by the adapter factory.
///
/// Owns the process-wide shared state (connection pool or map) and hands
/// out kind-scoped [`ArtifactStore`] handles over it. Lifetime is the
/// process lifetime; [`shutdown`](Self::shutdown) exists for testability.
#[async_trait]
pub trait StorageAdapter: Send + Sync + std::fmt::Debug {
    /// Creates a kind-scoped store handle sharing this adapter's pool.
    fn store(&self, kind: ArtifactKind) -> DynArtifactStore;

    /// Bulk-deletes rows past expiry across all kinds, returning the count.
    ///
    /// This is the cleanup routine's query; scheduling it periodically is
    /// the job of an external collaborator.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    async fn purge_expired(&self) -> StorageResult<u64>;

    /// Tears down the backend's shared state (closes the pool).
    ///
    /// Only needed by tests; production processes hold the adapter until
    /// exit.
    async fn shutdown(&self);

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Type alias for a shareable kind-scoped store handle.
pub type DynArtifactStore = Arc<dyn ArtifactStore>;

/// Type alias for a shareable backend adapter handle.
pub type DynAdapter = Arc<dyn StorageAdapter>;

// Ensure traits are object-safe by using them as trait objects
#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test that ArtifactStore is object-safe
    fn _assert_store_object_safe(_: &dyn ArtifactStore) {}

    // Compile-time test that StorageAdapter is object-safe
    fn _assert_adapter_object_safe(_: &dyn StorageAdapter) {}
}
