//! Storage abstraction layer for the Talisman identity provider.
//!
//! This crate defines the contract every storage backend must implement:
//! a kind-scoped [`ArtifactStore`] handle used by the protocol runtime for
//! all artifact reads and writes, and a backend-level [`StorageAdapter`]
//! that creates those handles over a shared connection pool.
//!
//! Artifacts are opaque JSON payloads (sessions, tokens, grants, client
//! registrations, device codes) with TTL-based visibility: a record whose
//! expiry has passed must never be returned by a find-style operation, even
//! though it may physically exist until the next purge.

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError, StorageResult};
pub use traits::{ArtifactStore, DynAdapter, DynArtifactStore, StorageAdapter};
pub use types::{ArtifactKind, IndexedFields, UnknownKindError, payload_fields};
