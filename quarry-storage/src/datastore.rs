//! Write and read paths for versioned, path-addressed records.
//!
//! A write appends a new record for a path and never touches the cache. A
//! read asks the cache first and on a miss runs a latest-version query
//! against the tenant's index, caching the decoded record on success.

use std::sync::Arc;

use quarry_core::{
    derive_identifier, Clock, DatastoreConfig, Namespace, QuarryError, QuarryResult,
    Record, SearchQuery, StorageError, SystemClock, UnixNanos,
};

use crate::backend::SearchBackend;
use crate::cache::{GenerationCache, TenantScopedKey};
use crate::context::OpContext;
use crate::lifecycle::IndexLifecycle;

/// Versioned record store over a [`SearchBackend`].
///
/// Cheap to clone; clones share the backend, clock and cache.
pub struct Datastore<B> {
    backend: Arc<B>,
    clock: Arc<dyn Clock>,
    cache: Arc<GenerationCache<Record>>,
    config: DatastoreConfig,
}

impl<B> Clone for Datastore<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            clock: Arc::clone(&self.clock),
            cache: Arc::clone(&self.cache),
            config: self.config.clone(),
        }
    }
}

impl<B: SearchBackend> Datastore<B> {
    /// Create a datastore stamping records with `clock`.
    pub fn new(backend: Arc<B>, clock: Arc<dyn Clock>, config: DatastoreConfig) -> QuarryResult<Self> {
        config.validate()?;
        let cache = Arc::new(GenerationCache::new(config.cache_ttl, Arc::clone(&clock)));
        Ok(Self {
            backend,
            clock,
            cache,
            config,
        })
    }

    /// Create a datastore stamping records with the system wall clock.
    pub fn with_system_clock(backend: Arc<B>, config: DatastoreConfig) -> QuarryResult<Self> {
        Self::new(backend, Arc::new(SystemClock), config)
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    /// The read cache shared by every clone of this datastore.
    pub fn cache(&self) -> &Arc<GenerationCache<Record>> {
        &self.cache
    }

    /// Index administration bound to this datastore's backend and cache.
    pub fn lifecycle(&self) -> IndexLifecycle<B> {
        IndexLifecycle::new(Arc::clone(&self.backend), self.config.index_suffix.clone())
            .with_cache(Arc::clone(&self.cache))
    }

    fn index_name(&self, namespace: &Namespace) -> String {
        namespace.index_name(&self.config.index_suffix)
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    /// Append a new version of `path` and return the record written.
    ///
    /// Earlier versions stay in the index. The cache is not updated, so a
    /// cached read may keep returning the previous version until the current
    /// generation ends; use [`Datastore::get_uncached`] to read your write.
    pub async fn put(
        &self,
        ctx: &OpContext,
        namespace: &Namespace,
        classification: &str,
        path: &str,
        kind: &str,
        payload: impl Into<String>,
    ) -> QuarryResult<Record> {
        require("classification", classification)?;
        require("path", path)?;
        require("kind", kind)?;

        let record = Record::new(classification, path, kind, payload, self.clock.now_nanos());
        let document = record.to_document()?;
        let index = self.index_name(namespace);

        ctx.run(self.backend.index(
            &index,
            classification,
            record.identifier.as_str(),
            &document,
        ))
        .await
        .inspect_err(|e| {
            tracing::warn!(namespace = %namespace, path, error = %e, "record write failed");
        })?;

        tracing::debug!(
            namespace = %namespace,
            identifier = %record.identifier,
            timestamp = record.timestamp,
            "record written"
        );
        Ok(record)
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    /// Latest version of `path`, served from the cache when possible.
    pub async fn get(
        &self,
        ctx: &OpContext,
        namespace: &Namespace,
        classification: &str,
        path: &str,
    ) -> QuarryResult<Record> {
        require("classification", classification)?;
        let identifier = derive_identifier(path);
        let key = TenantScopedKey::identifier(namespace, classification, &identifier);
        let query = SearchQuery::latest_by_identifier(identifier.as_str(), classification);
        self.read_latest(ctx, namespace, key, &query, true).await
    }

    /// Latest version of whichever path's identifier starts with `prefix`.
    ///
    /// If several paths share the prefix the newest record among them wins.
    pub async fn get_by_identifier_prefix(
        &self,
        ctx: &OpContext,
        namespace: &Namespace,
        classification: &str,
        prefix: &str,
    ) -> QuarryResult<Record> {
        require("classification", classification)?;
        require("identifier prefix", prefix)?;
        let key = TenantScopedKey::prefix(namespace, classification, prefix);
        let query = SearchQuery::latest_by_identifier_prefix(prefix, classification);
        self.read_latest(ctx, namespace, key, &query, true).await
    }

    /// Latest version of `path`, always asking the backend.
    ///
    /// The result still refreshes the cache entry for `path`.
    pub async fn get_uncached(
        &self,
        ctx: &OpContext,
        namespace: &Namespace,
        classification: &str,
        path: &str,
    ) -> QuarryResult<Record> {
        require("classification", classification)?;
        let identifier = derive_identifier(path);
        let key = TenantScopedKey::identifier(namespace, classification, &identifier);
        let query = SearchQuery::latest_by_identifier(identifier.as_str(), classification);
        self.read_latest(ctx, namespace, key, &query, false).await
    }

    /// The version of `path` written at exactly `timestamp`.
    pub async fn get_version(
        &self,
        ctx: &OpContext,
        namespace: &Namespace,
        classification: &str,
        path: &str,
        timestamp: UnixNanos,
    ) -> QuarryResult<Record> {
        require("classification", classification)?;
        let identifier = derive_identifier(path);
        let query = SearchQuery::exact_version(identifier.as_str(), classification, timestamp);

        self.search(ctx, namespace, &query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(namespace, format!("{identifier}@{timestamp}")))
    }

    /// Up to `limit` versions of `path`, newest first.
    ///
    /// A path that was never written has an empty history.
    pub async fn history(
        &self,
        ctx: &OpContext,
        namespace: &Namespace,
        classification: &str,
        path: &str,
        limit: usize,
    ) -> QuarryResult<Vec<Record>> {
        require("classification", classification)?;
        if limit == 0 {
            return Err(QuarryError::invalid("limit", "must be > 0"));
        }
        let identifier = derive_identifier(path);
        let query = SearchQuery::versions_of(identifier.as_str(), classification, limit);
        self.search(ctx, namespace, &query).await
    }

    async fn read_latest(
        &self,
        ctx: &OpContext,
        namespace: &Namespace,
        key: TenantScopedKey,
        query: &SearchQuery,
        use_cache: bool,
    ) -> QuarryResult<Record> {
        ctx.check()?;
        let encoded = key.encode();

        let caching = self.config.cache_enabled;
        if caching && use_cache {
            if let Some(hit) = self.cache.get(&encoded) {
                tracing::debug!(
                    namespace = %namespace,
                    key = key.key(),
                    generation = hit.generation(),
                    "cache hit"
                );
                return Ok(hit.into_value());
            }
        }

        // A flush while the search is in flight (for example a namespace
        // delete) means the result may belong to data that no longer exists.
        let epoch = self.cache.epoch();
        let record = self
            .search(ctx, namespace, query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| not_found(namespace, key.key()))?;

        if caching {
            self.cache.set_unless_flushed(encoded, record.clone(), epoch);
        }
        Ok(record)
    }

    /// Run `query` against the tenant's index and decode every hit.
    async fn search(
        &self,
        ctx: &OpContext,
        namespace: &Namespace,
        query: &SearchQuery,
    ) -> QuarryResult<Vec<Record>> {
        let index = self.index_name(namespace);
        tracing::debug!(index = %index, limit = query.limit, "querying backend");

        let documents = ctx
            .run(self.backend.search(&index, query))
            .await
            .inspect_err(|e| {
                if !e.is_cancelled() {
                    tracing::warn!(index = %index, error = %e, "backend search failed");
                }
            })?;

        documents
            .iter()
            .map(|doc| {
                Record::decode(doc).inspect_err(|e| {
                    tracing::warn!(index = %index, error = %e, "corrupt record in index");
                })
            })
            .collect()
    }
}

fn require(field: &str, value: &str) -> QuarryResult<()> {
    if value.is_empty() {
        return Err(QuarryError::missing(field));
    }
    Ok(())
}

fn not_found(namespace: &Namespace, key: impl Into<String>) -> QuarryError {
    StorageError::NotFound {
        namespace: namespace.to_string(),
        key: key.into(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemorySearchBackend;
    use quarry_core::{fields, MockClock};
    use serde_json::json;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const CLS: &str = "datastore";

    struct Fixture {
        store: Datastore<InMemorySearchBackend>,
        backend: Arc<InMemorySearchBackend>,
        clock: Arc<MockClock>,
        ctx: OpContext,
    }

    fn fixture_with(backend: InMemorySearchBackend, config: DatastoreConfig) -> Fixture {
        let backend = Arc::new(backend);
        let clock = Arc::new(MockClock::ticking(1_000, 1));
        let store = Datastore::new(Arc::clone(&backend), clock.clone(), config).unwrap();
        Fixture {
            store,
            backend,
            clock,
            ctx: OpContext::background(),
        }
    }

    fn fixture() -> Fixture {
        fixture_with(InMemorySearchBackend::new(), DatastoreConfig::default())
    }

    fn org1() -> Namespace {
        Namespace::new("org1").unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let f = fixture();
        let written = f
            .store
            .put(&f.ctx, &org1(), CLS, "/a/b.db", "Generic", r#"{"v":1}"#)
            .await
            .unwrap();
        assert_eq!(written.identifier, derive_identifier("/a/b.db"));

        let record = f.store.get(&f.ctx, &org1(), CLS, "/a/b.db").await.unwrap();
        assert_eq!(record, written);
        let payload: serde_json::Value = record.payload_json().unwrap();
        assert_eq!(payload, json!({"v": 1}));
    }

    #[tokio::test]
    async fn test_latest_timestamp_wins() {
        let f = fixture();
        f.clock.set(100);
        f.store.put(&f.ctx, &org1(), CLS, "/x.db", "Generic", "v1").await.unwrap();
        f.clock.set(200);
        f.store.put(&f.ctx, &org1(), CLS, "/x.db", "Generic", "v2").await.unwrap();

        let record = f.store.get(&f.ctx, &org1(), CLS, "/x.db").await.unwrap();
        assert_eq!(record.payload, "v2");
        assert_eq!(record.timestamp, 200);
    }

    #[tokio::test]
    async fn test_older_versions_are_retained() {
        let f = fixture();
        f.clock.set(100);
        f.store.put(&f.ctx, &org1(), CLS, "/x.db", "Generic", "v1").await.unwrap();
        f.clock.set(200);
        f.store.put(&f.ctx, &org1(), CLS, "/x.db", "Generic", "v2").await.unwrap();

        let v1 = f.store.get_version(&f.ctx, &org1(), CLS, "/x.db", 100).await.unwrap();
        assert_eq!(v1.payload, "v1");

        let history = f.store.history(&f.ctx, &org1(), CLS, "/x.db", 10).await.unwrap();
        let payloads: Vec<_> = history.iter().map(|r| r.payload.as_str()).collect();
        assert_eq!(payloads, vec!["v2", "v1"]);

        let err = f.store.get_version(&f.ctx, &org1(), CLS, "/x.db", 150).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_history_limit() {
        let f = fixture();
        for i in 0..5 {
            f.store.put(&f.ctx, &org1(), CLS, "/h", "Generic", format!("v{i}")).await.unwrap();
        }
        let history = f.store.history(&f.ctx, &org1(), CLS, "/h", 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].payload, "v4");

        let err = f.store.history(&f.ctx, &org1(), CLS, "/h", 0).await.unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(f.store.history(&f.ctx, &org1(), CLS, "/never", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let f = fixture();
        let err = f.store.get(&f.ctx, &org1(), CLS, "/never").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(f.store.cache().is_empty());
    }

    #[tokio::test]
    async fn test_put_rejects_empty_fields() {
        let f = fixture();
        for (cls, path, kind) in [("", "/p", "k"), (CLS, "", "k"), (CLS, "/p", "")] {
            let err = f.store.put(&f.ctx, &org1(), cls, path, kind, "x").await.unwrap_err();
            assert!(err.is_invalid_argument());
        }
        assert_eq!(f.backend.write_count(), 0);
    }

    #[tokio::test]
    async fn test_put_does_not_touch_cache() {
        let f = fixture();
        f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v1").await.unwrap();
        assert!(f.store.cache().is_empty());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_backend() {
        let f = fixture();
        f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v1").await.unwrap();

        f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        assert_eq!(f.backend.search_count(), 1);

        let again = f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        assert_eq!(again.payload, "v1");
        assert_eq!(f.backend.search_count(), 1);
        assert_eq!(f.store.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_cached_read_lags_until_bypassed() {
        let f = fixture();
        f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v1").await.unwrap();
        f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v2").await.unwrap();

        let cached = f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        assert_eq!(cached.payload, "v1");

        let fresh = f.store.get_uncached(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        assert_eq!(fresh.payload, "v2");

        // The bypass refreshed the cached entry.
        let cached = f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        assert_eq!(cached.payload, "v2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_generation_expires() {
        let f = fixture();
        f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v1").await.unwrap();
        f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v2").await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;

        let record = f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        assert_eq!(record.payload, "v2");
        assert_eq!(f.backend.search_count(), 2);
    }

    #[tokio::test]
    async fn test_cache_disabled() {
        let f = fixture_with(
            InMemorySearchBackend::new(),
            DatastoreConfig::default().with_cache_enabled(false),
        );
        f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v1").await.unwrap();
        f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        assert_eq!(f.backend.search_count(), 2);
        assert!(f.store.cache().is_empty());
    }

    #[tokio::test]
    async fn test_get_by_identifier_prefix() {
        let f = fixture();
        f.store.put(&f.ctx, &org1(), CLS, "/a/b.db", "Generic", "v1").await.unwrap();
        let prefix = &derive_identifier("/a/b.db").into_inner()[..8];

        let record = f
            .store
            .get_by_identifier_prefix(&f.ctx, &org1(), CLS, prefix)
            .await
            .unwrap();
        assert_eq!(record.path, "/a/b.db");

        let err = f
            .store
            .get_by_identifier_prefix(&f.ctx, &org1(), CLS, "")
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn test_prefix_and_exact_reads_cache_separately() {
        let f = fixture();
        f.store.put(&f.ctx, &org1(), CLS, "/a", "Generic", "v1").await.unwrap();
        let id = derive_identifier("/a");

        f.store.get(&f.ctx, &org1(), CLS, "/a").await.unwrap();
        f.store
            .get_by_identifier_prefix(&f.ctx, &org1(), CLS, id.as_str())
            .await
            .unwrap();
        assert_eq!(f.backend.search_count(), 2);
        assert_eq!(f.store.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let f = fixture();
        let org2 = Namespace::new("org2").unwrap();
        f.store.put(&f.ctx, &org1(), CLS, "/shared", "Generic", "one").await.unwrap();

        f.store.get(&f.ctx, &org1(), CLS, "/shared").await.unwrap();
        let err = f.store.get(&f.ctx, &org2, CLS, "/shared").await.unwrap_err();
        assert!(err.is_not_found());

        f.store.put(&f.ctx, &org2, CLS, "/shared", "Generic", "two").await.unwrap();
        let record = f.store.get(&f.ctx, &org2, CLS, "/shared").await.unwrap();
        assert_eq!(record.payload, "two");
    }

    #[tokio::test]
    async fn test_classification_filters_documents() {
        let f = fixture();
        f.store.put(&f.ctx, &org1(), "dashboard", "/p", "Generic", "other").await.unwrap();
        let err = f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_backend_unavailable_is_not_cached() {
        let f = fixture();
        f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v1").await.unwrap();
        f.backend.set_unavailable(true);

        let err = f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap_err();
        assert!(err.is_backend_unavailable());
        assert!(f.store.cache().is_empty());

        let err = f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v2").await.unwrap_err();
        assert!(err.is_backend_unavailable());
    }

    #[tokio::test]
    async fn test_corrupt_record_surfaces() {
        let f = fixture();
        let id = derive_identifier("/bad");
        f.backend.insert_raw(
            "org1_datastore",
            json!({
                (fields::IDENTIFIER): id.as_str(),
                (fields::CLASSIFICATION): CLS,
                (fields::TIMESTAMP): 5,
            }),
        );

        let err = f.store.get(&f.ctx, &org1(), CLS, "/bad").await.unwrap_err();
        assert!(err.is_corrupt_record());
        assert!(f.store.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_read_does_not_populate_cache() {
        let f = fixture_with(
            InMemorySearchBackend::new().with_latency(Duration::from_secs(5)),
            DatastoreConfig::default(),
        );
        f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v1").await.unwrap();

        let ctx = OpContext::with_timeout(Duration::from_secs(1));
        let err = f.store.get(&ctx, &org1(), CLS, "/p").await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(f.store.cache().is_empty());
    }

    #[tokio::test]
    async fn test_already_cancelled_context() {
        let f = fixture();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = OpContext::with_cancellation(token);

        let err = f.store.put(&ctx, &org1(), CLS, "/p", "Generic", "v1").await.unwrap_err();
        assert!(err.is_cancelled());
        let err = f.store.get(&ctx, &org1(), CLS, "/p").await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(f.backend.write_count(), 0);
        assert_eq!(f.backend.search_count(), 0);
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        for ttl in [Duration::ZERO, Duration::from_secs(u64::MAX)] {
            let backend = Arc::new(InMemorySearchBackend::new());
            let config = DatastoreConfig::default().with_cache_ttl(ttl);
            let err = Datastore::with_system_clock(backend, config).err().unwrap();
            assert!(matches!(err, QuarryError::Config(_)));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_read_racing_a_delete_is_not_cached() {
        let f = fixture_with(
            InMemorySearchBackend::new().with_latency(Duration::from_secs(5)),
            DatastoreConfig::default(),
        );
        f.store.put(&f.ctx, &org1(), CLS, "/p", "Generic", "v1").await.unwrap();

        let reader = {
            let store = f.store.clone();
            let ctx = f.ctx.clone();
            tokio::spawn(async move { store.get(&ctx, &org1(), CLS, "/p").await })
        };

        // The search is now in flight; the namespace is torn down meanwhile.
        tokio::time::sleep(Duration::from_secs(1)).await;
        f.store.cache().clear();

        let record = reader.await.unwrap().unwrap();
        assert_eq!(record.payload, "v1");
        assert!(f.store.cache().is_empty());

        // A read that starts after the flush caches as usual.
        f.store.get(&f.ctx, &org1(), CLS, "/p").await.unwrap();
        assert_eq!(f.store.cache().len(), 1);
    }
}
