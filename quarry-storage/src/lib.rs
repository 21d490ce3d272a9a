//! Quarry Storage - Versioned Records over a Search Engine
//!
//! Stores the value of a virtual path as a series of immutable records in a
//! document-search engine and reads back the newest one. Each tenant
//! namespace gets its own index; a process-local cache absorbs repeated
//! reads for one fixed window at a time.
//!
//! The engine itself sits behind [`SearchBackend`]. [`InMemorySearchBackend`]
//! is used in tests and [`HttpSearchBackend`] talks to an
//! Elasticsearch-compatible cluster.

pub mod backend;
pub mod cache;
pub mod context;
pub mod datastore;
pub mod lifecycle;

pub use backend::{HttpSearchBackend, InMemorySearchBackend, SearchBackend};
pub use cache::{CacheRead, CacheStats, GenerationCache, LookupKind, TenantScopedKey};
pub use context::OpContext;
pub use datastore::Datastore;
pub use lifecycle::IndexLifecycle;

pub use quarry_core::{
    derive_identifier, Identifier, Namespace, QuarryError, QuarryResult, Record,
};

pub use tokio_util::sync::CancellationToken;
