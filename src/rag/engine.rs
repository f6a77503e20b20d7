//! Retrieval engine orchestration.
//!
//! Owns the availability and degradation policy: retrieval is an
//! enhancement to prompting, never a required dependency, so provider
//! and storage failures degrade to "no context" with a logged warning.
//! The one exception is an embedding dimension mismatch, which signals
//! store corruption or a model change and is surfaced to the caller.

use std::sync::Arc;

use uuid::Uuid;

use super::context_builder::ContextAssembler;
use super::ranker;
use super::store::DocumentStore;
use super::types::{ContextOptions, Fragment, FragmentSource, SearchOptions, SearchResult};
use crate::core::config::RagSettings;
use crate::core::errors::RagError;
use crate::embedding::Embedder;

/// Explicitly constructed at the host's composition root with an
/// injected embedder and store; holds no ranking state between calls.
pub struct RagEngine {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
    assembler: ContextAssembler,
    settings: RagSettings,
}

impl RagEngine {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn DocumentStore>,
        settings: RagSettings,
    ) -> Self {
        let assembler = ContextAssembler::new(settings.context.clone());
        Self {
            embedder,
            store,
            assembler,
            settings,
        }
    }

    /// Whether retrieval is active. Derived solely from credential state.
    pub fn available(&self) -> bool {
        self.embedder.is_configured()
    }

    /// Hand the engine an embedding credential. Flips `available()`.
    pub fn set_credential(&self, key: &str) -> Result<(), RagError> {
        self.embedder.set_credential(key)
    }

    /// Index one source record as a single fragment with `chunk_index 0`.
    ///
    /// Silently skips when retrieval is unavailable or the text is below
    /// the minimum worth embedding. Failures are logged, never surfaced:
    /// message ingestion must not stall on this subsystem.
    pub async fn index_fragment(&self, source: &FragmentSource) {
        if !self.available() {
            tracing::debug!(source_id = %source.id, "skipping index: embedding credential not configured");
            return;
        }
        if source.text.chars().count() < self.settings.min_index_chars {
            tracing::debug!(source_id = %source.id, "skipping index: text below minimum length");
            return;
        }

        let embedding = match self.embedder.embed(&source.text).await {
            Ok(embedding) => embedding,
            Err(err) => {
                tracing::warn!(source_id = %source.id, "failed to embed fragment: {err}");
                return;
            }
        };

        let fragment = Fragment {
            id: Uuid::new_v4().to_string(),
            source_type: source.source_type,
            source_id: source.id.clone(),
            text: source.text.clone(),
            chunk_index: 0,
            metadata: source.metadata(),
        };

        if let Err(err) = self.store.put(fragment, embedding).await {
            tracing::warn!(source_id = %source.id, "failed to store fragment: {err}");
        }
    }

    /// Rank stored fragments against a query.
    ///
    /// Returns an empty list when retrieval is unavailable or the store
    /// is empty, and degrades to empty on recoverable failures. Only a
    /// dimension mismatch propagates.
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        if !self.available() {
            return Ok(Vec::new());
        }

        match self.search_inner(query, options).await {
            Ok(results) => Ok(results),
            Err(err) if err.is_recoverable() => {
                tracing::warn!("search degraded to empty result: {err}");
                Ok(Vec::new())
            }
            Err(err) => Err(err),
        }
    }

    async fn search_inner(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, RagError> {
        if self.store.count().await? == 0 {
            return Ok(Vec::new());
        }

        if self.store.supports_vector_search() {
            let query_embedding = self.embedder.embed(query).await?;
            ranker::top_k(self.store.as_ref(), &query_embedding, options).await
        } else {
            ranker::keyword_top_k(self.store.as_ref(), query, options).await
        }
    }

    /// Search, then assemble the hits into a bounded context block.
    /// Empty string under the same conditions `search` returns nothing.
    pub async fn build_context(
        &self,
        query: &str,
        options: &ContextOptions,
    ) -> Result<String, RagError> {
        let results = self.search(query, &options.search).await?;
        Ok(self
            .assembler
            .assemble(&results, options.max_chars, options.include_metadata))
    }

    /// Cascade a source record's deletion into the fragment store.
    pub async fn delete_source(&self, source_id: &str) -> Result<usize, RagError> {
        self.store.delete_by_source(source_id).await
    }
}
