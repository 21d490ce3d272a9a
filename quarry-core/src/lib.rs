//! Quarry Core - Record and Query Types
//!
//! Pure data types shared by the storage layer: identifier derivation, the
//! versioned record model, tenant namespaces, typed search queries, clock
//! sources, errors, and configuration. No I/O happens in this crate.

pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod identity;
pub mod namespace;
pub mod query;
pub mod record;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{
    BackendConfig, DatastoreConfig, QuarryConfig, DEFAULT_CACHE_TTL, DEFAULT_INDEX_SUFFIX,
    MAX_CACHE_TTL,
};
pub use error::{ConfigError, ErrorKind, QuarryError, QuarryResult, StorageError, ValidationError};
pub use filter::FilterExpr;
pub use identity::{derive_identifier, Identifier, UnixNanos, IDENTIFIER_LEN};
pub use namespace::{Namespace, MAX_NAMESPACE_LEN};
pub use query::{SearchQuery, SortField, SortOrder};
pub use record::{fields, Record};
