//! In-memory vector backend using exact cosine similarity.
//!
//! This module provides [`InMemoryBackend`], an append-only list of documents
//! protected by a `tokio::sync::RwLock`. Search is a linear scan, so it is the
//! fallback path rather than the primary one.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::VectorBackend;
use crate::document::{Document, ResultMetadata, SearchResult};
use crate::error::Result;
use crate::similarity::cosine_similarity;

/// An in-memory [`VectorBackend`] using cosine similarity for search.
///
/// Documents are kept in insertion order. Adding a document whose id is
/// already present stores a second row; nothing is deduplicated.
///
/// # Example
///
/// ```rust,ignore
/// use newsrag::{InMemoryBackend, VectorBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.add(&documents).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    documents: RwLock<Vec<Document>>,
}

impl InMemoryBackend {
    /// Create a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn add(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let mut store = self.documents.write().await;
        store.extend_from_slice(documents);
        debug!(count = documents.len(), total = store.len(), "added documents to memory");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let store = self.documents.read().await;

        let mut scored: Vec<(f32, &Document)> =
            store.iter().map(|doc| (cosine_similarity(embedding, &doc.embedding), doc)).collect();

        // Scores are always finite, so `total_cmp` agrees with `>=`. Stable
        // sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(score, doc)| SearchResult {
                id: doc.id.clone(),
                text: doc.text.clone(),
                score,
                metadata: ResultMetadata::project(&doc.metadata),
            })
            .collect())
    }

    async fn clear(&self) -> Result<()> {
        let mut store = self.documents.write().await;
        let removed = store.len();
        store.clear();
        debug!(removed, "cleared in-memory documents");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.documents.read().await.len())
    }
}
