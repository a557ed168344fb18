//! Retrieval pipeline.
//!
//! The [`RetrievalPipeline`] sits between the chat surface and the
//! [`VectorStore`]: it embeds incoming documents and queries with an
//! [`EmbeddingProvider`], stores and searches through the store, and turns
//! the retrieved documents into a context block for the language model.
//!
//! # Example
//!
//! ```rust,ignore
//! use newsrag::{RetrievalConfig, RetrievalPipeline, StoreConfig, VectorStore};
//!
//! let store = Arc::new(VectorStore::new(StoreConfig::default()));
//! let pipeline = RetrievalPipeline::builder()
//!     .config(RetrievalConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .store(store)
//!     .build()?;
//!
//! pipeline.ingest(&articles).await?;
//! let results = pipeline.retrieve("what happened in the markets today?").await?;
//! let context = pipeline.build_context(&results);
//! ```

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::config::RetrievalConfig;
use crate::document::{Document, RawDocument, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StoreError};
use crate::store::VectorStore;

/// Embeds, stores and retrieves documents for answer generation.
///
/// Construct one via [`RetrievalPipeline::builder()`].
pub struct RetrievalPipeline {
    config: RetrievalConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    store: Arc<VectorStore>,
}

impl RetrievalPipeline {
    /// Create a new [`RetrievalPipelineBuilder`].
    pub fn builder() -> RetrievalPipelineBuilder {
        RetrievalPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// Embed raw documents and add them to the store.
    ///
    /// Documents with blank text are skipped. Returns the number of
    /// documents handed to the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Pipeline`] if embedding fails or the provider
    /// returns the wrong number of vectors. Storage itself never fails; see
    /// [`VectorStore::add`].
    pub async fn ingest(&self, documents: &[RawDocument]) -> Result<usize> {
        let documents: Vec<&RawDocument> =
            documents.iter().filter(|d| !d.text.trim().is_empty()).collect();
        if documents.is_empty() {
            info!(document_count = 0, "nothing to ingest");
            return Ok(0);
        }

        let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
        let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
            error!(document_count = texts.len(), error = %e, "embedding failed during ingestion");
            StoreError::Pipeline(format!("embedding failed for {} documents: {e}", texts.len()))
        })?;

        if embeddings.len() != documents.len() {
            return Err(StoreError::Pipeline(format!(
                "embedding provider returned {} vectors for {} documents",
                embeddings.len(),
                documents.len()
            )));
        }

        let documents: Vec<Document> = documents
            .into_iter()
            .zip(embeddings)
            .map(|(raw, embedding)| Document::from_raw(raw.clone(), embedding))
            .collect();

        self.store.add(&documents).await;

        let document_count = documents.len();
        info!(document_count, "ingested documents");
        Ok(document_count)
    }

    /// Retrieve the configured `top_k` documents most relevant to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Pipeline`] if the query cannot be embedded.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retrieve_with_top_k(query, self.config.top_k).await
    }

    /// Retrieve up to `top_k` documents most relevant to `query`.
    ///
    /// Results below the configured `similarity_threshold` are dropped. A
    /// blank query returns no results without calling the provider.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Pipeline`] if the query cannot be embedded.
    pub async fn retrieve_with_top_k(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        if query.trim().is_empty() {
            debug!("blank query, skipping retrieval");
            return Ok(Vec::new());
        }

        let query_embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during retrieval");
            StoreError::Pipeline(format!("query embedding failed: {e}"))
        })?;

        let results = self.store.search(&query_embedding, top_k).await;

        let threshold = self.config.similarity_threshold;
        let filtered: Vec<SearchResult> =
            results.into_iter().filter(|r| r.score >= threshold).collect();

        info!(result_count = filtered.len(), top_k, "retrieval completed");
        Ok(filtered)
    }

    /// Format retrieved documents as numbered context blocks for the
    /// language model.
    ///
    /// Blocks are added in rank order until `max_context_chars` would be
    /// exceeded. A first block longer than the limit is cut to fit.
    pub fn build_context(&self, results: &[SearchResult]) -> String {
        let max = self.config.max_context_chars;
        let mut context = String::new();
        let mut used = 0;

        for (rank, result) in results.iter().enumerate() {
            let block = format_block(rank + 1, result);
            let separator = if context.is_empty() { 0 } else { 2 };
            let len = block.chars().count();

            if used + separator + len > max {
                if context.is_empty() {
                    context = block.chars().take(max).collect();
                }
                break;
            }
            if separator > 0 {
                context.push_str("\n\n");
            }
            context.push_str(&block);
            used += separator + len;
        }

        context
    }
}

fn format_block(rank: usize, result: &SearchResult) -> String {
    let meta = &result.metadata;
    let title = meta.title.as_deref().unwrap_or("Untitled");
    let attribution: Vec<&str> =
        [meta.source.as_deref(), meta.pub_date.as_deref()].into_iter().flatten().collect();

    let mut block = format!("[{rank}] {title}");
    if !attribution.is_empty() {
        block.push_str(&format!(" ({})", attribution.join(", ")));
    }
    if let Some(link) = &meta.link {
        block.push_str(&format!("\nLink: {link}"));
    }
    block.push('\n');
    block.push_str(result.text.trim());
    block
}

/// Builder for constructing a [`RetrievalPipeline`].
///
/// `config` defaults to [`RetrievalConfig::default()`]; the embedding
/// provider and the store are required.
#[derive(Default)]
pub struct RetrievalPipelineBuilder {
    config: Option<RetrievalConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    store: Option<Arc<VectorStore>>,
}

impl RetrievalPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RetrievalConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store.
    pub fn store(mut self, store: Arc<VectorStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the [`RetrievalPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if any required field is missing.
    pub fn build(self) -> Result<RetrievalPipeline> {
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| StoreError::Config("embedding_provider is required".to_string()))?;
        let store =
            self.store.ok_or_else(|| StoreError::Config("store is required".to_string()))?;

        Ok(RetrievalPipeline {
            config: self.config.unwrap_or_default(),
            embedding_provider,
            store,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::document::ResultMetadata;

    fn result(text: &str, metadata: serde_json::Value) -> SearchResult {
        SearchResult {
            id: "id".into(),
            text: text.into(),
            score: 0.9,
            metadata: ResultMetadata::project(metadata.as_object().unwrap()),
        }
    }

    #[test]
    fn block_includes_attribution_and_link() {
        let block = format_block(
            1,
            &result(
                " Markets rallied. ",
                json!({
                    "title": "Stocks up",
                    "source": "Wire",
                    "pubDate": "Tue, 02 Jan 2024",
                    "link": "https://example.com/a"
                }),
            ),
        );
        assert_eq!(
            block,
            "[1] Stocks up (Wire, Tue, 02 Jan 2024)\nLink: https://example.com/a\nMarkets rallied."
        );
    }

    #[test]
    fn block_without_metadata() {
        assert_eq!(format_block(2, &result("body", json!({}))), "[2] Untitled\nbody");
    }
}
