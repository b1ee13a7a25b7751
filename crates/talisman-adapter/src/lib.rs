//! Backend selection for the Talisman artifact store.
//!
//! The adapter factory runs once at process startup: it reads an
//! [`AdapterConfig`], initializes exactly one storage backend, and returns
//! a ready [`talisman_storage::DynAdapter`] that the protocol runtime uses
//! for every artifact read and write for the remainder of the process
//! lifetime.
//!
//! Selection is a closed dispatch over [`BackendKind`]; a configuration
//! naming anything else fails during deserialization, before any store
//! operation is reachable. Every error on this path is fatal by contract:
//! the embedding process must abort rather than serve traffic.

mod config;
mod error;
mod factory;

pub use config::{AdapterConfig, BackendKind};
pub use error::AdapterError;
pub use factory::select_adapter;

// Re-export the handle types callers hold on to.
pub use talisman_storage::{ArtifactKind, DynAdapter, DynArtifactStore, StorageAdapter};
