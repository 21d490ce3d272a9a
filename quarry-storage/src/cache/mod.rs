//! Read cache for record lookups.
//!
//! [`GenerationCache`] holds values for one fixed window and then drops them
//! all at once, so a cached read is never older than the window. Record
//! lookups are keyed by [`TenantScopedKey`], which cannot be built without a
//! namespace and classification; a cached record is never served across
//! tenants.

pub mod generation;
pub mod read;
pub mod tenant_key;

pub use generation::{CacheStats, GenerationCache};
pub use read::CacheRead;
pub use tenant_key::{LookupKind, TenantScopedKey};
