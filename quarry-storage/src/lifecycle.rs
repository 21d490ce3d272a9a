//! Administrative index operations.
//!
//! These are destructive and meant for startup or test fixtures, never for
//! the per-request path.

use std::sync::Arc;

use quarry_core::{Namespace, QuarryError, QuarryResult, Record, StorageError};

use crate::backend::SearchBackend;
use crate::cache::GenerationCache;
use crate::context::OpContext;

/// Creates, deletes and enumerates the per-namespace indices.
pub struct IndexLifecycle<B> {
    backend: Arc<B>,
    index_suffix: String,
    cache: Option<Arc<GenerationCache<Record>>>,
}

impl<B: SearchBackend> IndexLifecycle<B> {
    pub fn new(backend: Arc<B>, index_suffix: impl Into<String>) -> Self {
        Self {
            backend,
            index_suffix: index_suffix.into(),
            cache: None,
        }
    }

    /// Clear `cache` whenever an index is deleted, so records of a removed
    /// namespace are never served from it.
    pub fn with_cache(mut self, cache: Arc<GenerationCache<Record>>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn index_suffix(&self) -> &str {
        &self.index_suffix
    }

    /// Remove every record of `namespace`.
    ///
    /// Deleting a namespace that has no index succeeds.
    pub async fn delete(&self, ctx: &OpContext, namespace: &Namespace) -> QuarryResult<()> {
        let index = namespace.index_name(&self.index_suffix);
        match ctx.run(self.backend.delete_indices(&index)).await {
            Ok(()) => {}
            Err(QuarryError::Storage(StorageError::IndexNotFound { .. })) => {
                tracing::debug!(index = %index, "index already absent");
            }
            Err(e) => {
                tracing::warn!(index = %index, error = %e, "index delete failed");
                return Err(e);
            }
        }

        if let Some(cache) = &self.cache {
            cache.clear();
        }
        tracing::info!(namespace = %namespace, index = %index, "namespace deleted");
        Ok(())
    }

    /// Delete `namespace` and recreate its index empty.
    pub async fn reset(&self, ctx: &OpContext, namespace: &Namespace) -> QuarryResult<()> {
        self.delete(ctx, namespace).await?;
        let index = namespace.index_name(&self.index_suffix);
        ctx.run(self.backend.create_index(&index))
            .await
            .inspect_err(|e| tracing::warn!(index = %index, error = %e, "index create failed"))?;
        tracing::info!(namespace = %namespace, index = %index, "namespace reset");
        Ok(())
    }

    /// Namespaces that currently have an index, sorted.
    ///
    /// Indices without the datastore suffix, or whose stem is not a valid
    /// namespace, are skipped.
    pub async fn list_namespaces(&self, ctx: &OpContext) -> QuarryResult<Vec<Namespace>> {
        let indices = ctx.run(self.backend.list_indices()).await?;
        let mut namespaces: Vec<Namespace> = indices
            .iter()
            .filter_map(|index| Namespace::from_index_name(index, &self.index_suffix))
            .collect();
        namespaces.sort();
        namespaces.dedup();
        tracing::info!(indices = indices.len(), namespaces = namespaces.len(), "listed namespaces");
        Ok(namespaces)
    }
}
