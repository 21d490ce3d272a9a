//! The backing document-search engine.
//!
//! The engine offers document indexing and filtered, sorted search, but no
//! key lookup. Everything the datastore needs from it is captured by
//! [`SearchBackend`]; [`InMemorySearchBackend`] is the reference engine used
//! in tests and [`HttpSearchBackend`] speaks the Elasticsearch-compatible REST
//! dialect.

pub mod http;
pub mod memory;

pub use http::HttpSearchBackend;
pub use memory::InMemorySearchBackend;

use async_trait::async_trait;
use quarry_core::{QuarryResult, SearchQuery};
use serde_json::Value;

/// Client for the backing search engine.
///
/// Implementations must not retry internally. Transport failures and
/// rejected reads or writes are reported as `BackendUnavailable`; a rejected
/// index creation or deletion is an `IndexError`. Callers apply their own
/// retry policy.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Add a new document to `index`. Never overwrites an existing document.
    ///
    /// A missing index is created with the record mapping first.
    async fn index(
        &self,
        index: &str,
        classification: &str,
        identifier: &str,
        document: &Value,
    ) -> QuarryResult<()>;

    /// Run a search against `index`.
    ///
    /// A missing index yields no documents rather than an error.
    async fn search(&self, index: &str, query: &SearchQuery) -> QuarryResult<Vec<Value>>;

    /// Create an empty index. Creating an index that already exists is not an error.
    async fn create_index(&self, index: &str) -> QuarryResult<()>;

    /// Delete every index matching `pattern` (`*` matches any run of characters).
    ///
    /// Matching nothing is not an error.
    async fn delete_indices(&self, pattern: &str) -> QuarryResult<()>;

    /// Names of all existing indices.
    async fn list_indices(&self) -> QuarryResult<Vec<String>>;
}
