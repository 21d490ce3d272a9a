//! Elasticsearch-compatible REST backend.
//!
//! Typed [`SearchQuery`] values are translated into the JSON query DSL here;
//! nothing caller-supplied is ever formatted into query text.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use quarry_core::{
    fields, BackendConfig, ConfigError, FilterExpr, QuarryError, QuarryResult, SearchQuery,
    SortOrder, StorageError,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::memory::glob_matches;
use super::SearchBackend;

/// Search backend talking to an Elasticsearch/OpenSearch cluster over HTTP.
///
/// Index names are sent as single percent-encoded path segments, so a name
/// can never smuggle in extra path components or escapes.
#[derive(Debug, Clone)]
pub struct HttpSearchBackend {
    client: Client,
    config: BackendConfig,
    base: Url,
    /// Indices known to exist with the record mapping.
    mapped: Arc<Mutex<HashSet<String>>>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
struct HitsEnvelope {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Debug, Deserialize)]
struct CatIndex {
    index: String,
}

impl HttpSearchBackend {
    /// Build a backend from validated configuration.
    ///
    /// No request timeout is set; callers bound operations with their own
    /// deadline.
    pub fn new(config: BackendConfig) -> QuarryResult<Self> {
        config.validate()?;
        let base = Url::parse(config.base_url.trim()).map_err(|e| ConfigError::InvalidValue {
            field: "base_url".to_string(),
            value: config.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue {
                field: "base_url".to_string(),
                value: config.base_url.clone(),
                reason: "cannot be used as a base URL".to_string(),
            }
            .into());
        }
        let client = Client::builder()
            .build()
            .map_err(|e| QuarryError::backend(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            base,
            mapped: Arc::default(),
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Base URL extended by `segments`, each percent-encoded as one segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.config.username, &self.config.password) {
            (Some(user), password) => request.basic_auth(user, password.as_ref()),
            _ => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> QuarryResult<Response> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| QuarryError::backend(format!("request failed: {e}")))
    }

    fn mapped(&self) -> MutexGuard<'_, HashSet<String>> {
        self.mapped.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create `index` with the record mapping unless this client already did.
    ///
    /// Without it the engine would create the index on first write with
    /// dynamic mappings, analyzing `id`, `path` and `doc_type` as text so
    /// that exact-match filters stop matching.
    async fn ensure_mapped(&self, index: &str) -> QuarryResult<()> {
        if self.mapped().contains(index) {
            return Ok(());
        }
        self.create_index(index).await
    }
}

/// Turn a non-success response into `BackendUnavailable`.
async fn fail(operation: &str, response: Response) -> QuarryError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    QuarryError::backend(format!("{operation} returned {status}: {body}"))
}

/// Turn a rejected index administration call into `IndexError`.
fn index_error(index: &str, operation: &str, status: StatusCode, body: &str) -> QuarryError {
    StorageError::IndexError {
        index_name: index.to_string(),
        reason: format!("{operation} returned {status}: {body}"),
    }
    .into()
}

/// Translate a filter tree into the query DSL.
pub fn filter_to_dsl(filter: &FilterExpr) -> Value {
    match filter {
        FilterExpr::Term { field, value } => json!({ "term": { field: value } }),
        FilterExpr::Prefix { field, value } => json!({ "prefix": { field: value } }),
        FilterExpr::And(filters) if filters.is_empty() => json!({ "match_all": {} }),
        FilterExpr::And(filters) => json!({
            "bool": { "filter": filters.iter().map(filter_to_dsl).collect::<Vec<_>>() }
        }),
        FilterExpr::Or(filters) if filters.is_empty() => json!({ "match_none": {} }),
        FilterExpr::Or(filters) => json!({
            "bool": {
                "should": filters.iter().map(filter_to_dsl).collect::<Vec<_>>(),
                "minimum_should_match": 1
            }
        }),
        FilterExpr::Not(inner) => json!({ "bool": { "must_not": [filter_to_dsl(inner)] } }),
    }
}

/// Translate a full search request into a `_search` body.
pub fn query_to_dsl(query: &SearchQuery) -> Value {
    let sort: Vec<Value> = query
        .sort
        .iter()
        .map(|s| {
            let order = match s.order {
                SortOrder::Asc => "asc",
                SortOrder::Desc => "desc",
            };
            let mut key = Map::new();
            key.insert(s.field.clone(), json!({ "order": order }));
            Value::Object(key)
        })
        .collect();

    json!({
        "query": filter_to_dsl(&query.filter),
        "sort": sort,
        "size": query.limit,
    })
}

/// Index mapping: exact-match keyword fields, unindexed payload.
pub fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                (fields::IDENTIFIER): { "type": "keyword" },
                (fields::KIND): { "type": "keyword" },
                (fields::PATH): { "type": "keyword" },
                (fields::CLASSIFICATION): { "type": "keyword" },
                (fields::PAYLOAD): { "type": "text", "index": false },
                (fields::TIMESTAMP): { "type": "long" }
            }
        }
    })
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    async fn index(
        &self,
        index: &str,
        classification: &str,
        identifier: &str,
        document: &Value,
    ) -> QuarryResult<()> {
        self.ensure_mapped(index).await?;

        let mut request = self.client.post(self.url(&[index, "_doc"])).json(document);
        if self.config.refresh_on_write {
            request = request.query(&[("refresh", "wait_for")]);
        }

        tracing::trace!(index, classification, identifier, "indexing document");
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(fail("index", response).await);
        }
        Ok(())
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> QuarryResult<Vec<Value>> {
        let request = self
            .client
            .post(self.url(&[index, "_search"]))
            .json(&query_to_dsl(query));

        let response = self.send(request).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !response.status().is_success() {
            return Err(fail("search", response).await);
        }
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| QuarryError::backend(format!("malformed search response: {e}")))?;
        Ok(body.hits.hits.into_iter().map(|hit| hit.source).collect())
    }

    async fn create_index(&self, index: &str) -> QuarryResult<()> {
        let request = self.client.put(self.url(&[index])).json(&index_mapping());
        let response = self.send(request).await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let exists =
            status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception");
        if !status.is_success() && !exists {
            return Err(index_error(index, "create index", status, &body));
        }
        self.mapped().insert(index.to_string());
        Ok(())
    }

    async fn delete_indices(&self, pattern: &str) -> QuarryResult<()> {
        let request = self
            .client
            .delete(self.url(&[pattern]))
            .query(&[("ignore_unavailable", "true"), ("allow_no_indices", "true")]);
        let response = self.send(request).await?;
        let status = response.status();
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            let body = response.text().await.unwrap_or_default();
            return Err(index_error(pattern, "delete indices", status, &body));
        }
        self.mapped().retain(|name| !glob_matches(pattern, name));
        Ok(())
    }

    async fn list_indices(&self) -> QuarryResult<Vec<String>> {
        let request = self
            .client
            .get(self.url(&["_cat", "indices"]))
            .query(&[("format", "json"), ("h", "index")]);
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(fail("list indices", response).await);
        }
        let rows: Vec<CatIndex> = response
            .json()
            .await
            .map_err(|e| QuarryError::backend(format!("malformed index listing: {e}")))?;
        Ok(rows.into_iter().map(|row| row.index).collect())
    }
}
