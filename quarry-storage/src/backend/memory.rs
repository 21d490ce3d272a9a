//! In-memory search engine for tests and embedded use.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use quarry_core::{QuarryError, QuarryResult, SearchQuery};
use serde_json::Value;

use super::SearchBackend;

/// In-memory search engine.
///
/// Each index is an append-only list of documents. Searches evaluate the
/// filter tree, stable-sort by the query's sort keys (so equal keys keep
/// insertion order) and truncate to the limit.
#[derive(Debug, Default)]
pub struct InMemorySearchBackend {
    indices: Arc<RwLock<BTreeMap<String, Vec<Value>>>>,
    unavailable: AtomicBool,
    latency: RwLock<Option<Duration>>,
    searches: AtomicU64,
    writes: AtomicU64,
}

impl InMemorySearchBackend {
    /// Create a new, empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` (useful for cancellation tests).
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.write().unwrap_or_else(|e| e.into_inner()) = Some(latency);
        self
    }

    /// Make every subsequent call fail with `BackendUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Append a raw document, bypassing record encoding.
    pub fn insert_raw(&self, index: &str, document: Value) {
        self.write_indices()
            .entry(index.to_string())
            .or_default()
            .push(document);
    }

    /// Number of `search` calls served so far.
    pub fn search_count(&self) -> u64 {
        self.searches.load(Ordering::SeqCst)
    }

    /// Number of `index` calls served so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of documents stored in `index`.
    pub fn document_count(&self, index: &str) -> usize {
        self.read_indices().get(index).map_or(0, Vec::len)
    }

    fn read_indices(&self) -> RwLockReadGuard<'_, BTreeMap<String, Vec<Value>>> {
        self.indices.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_indices(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Vec<Value>>> {
        self.indices.write().unwrap_or_else(|e| e.into_inner())
    }

    async fn enter(&self) -> QuarryResult<()> {
        let latency = *self.latency.read().unwrap_or_else(|e| e.into_inner());
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QuarryError::backend("in-memory backend marked unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchBackend for InMemorySearchBackend {
    async fn index(
        &self,
        index: &str,
        _classification: &str,
        _identifier: &str,
        document: &Value,
    ) -> QuarryResult<()> {
        self.enter().await?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert_raw(index, document.clone());
        Ok(())
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> QuarryResult<Vec<Value>> {
        self.enter().await?;
        self.searches.fetch_add(1, Ordering::SeqCst);

        let indices = self.read_indices();
        let Some(documents) = indices.get(index) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<Value> = documents
            .iter()
            .filter(|doc| query.filter.matches(doc))
            .cloned()
            .collect();
        hits.sort_by(|a, b| query.compare(a, b));
        hits.truncate(query.limit);
        Ok(hits)
    }

    async fn create_index(&self, index: &str) -> QuarryResult<()> {
        self.enter().await?;
        self.write_indices().entry(index.to_string()).or_default();
        Ok(())
    }

    async fn delete_indices(&self, pattern: &str) -> QuarryResult<()> {
        self.enter().await?;
        self.write_indices()
            .retain(|name, _| !glob_matches(pattern, name));
        Ok(())
    }

    async fn list_indices(&self) -> QuarryResult<Vec<String>> {
        self.enter().await?;
        Ok(self.read_indices().keys().cloned().collect())
    }
}

/// Match `name` against a pattern where `*` matches any run of characters.
pub(crate) fn glob_matches(pattern: &str, name: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        // No wildcard: exact match.
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}
