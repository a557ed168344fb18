//! Backend trait shared by the persistent and in-memory vector backends.

use async_trait::async_trait;

use crate::document::{Document, SearchResult};
use crate::error::Result;

/// A storage backend for embedded documents with similarity search.
///
/// Each backend owns exactly one logical collection. The
/// [`VectorStore`](crate::VectorStore) routes every call to whichever backend
/// is active, so both implementations must honor the same contract:
///
/// - `add` with an empty slice is a no-op.
/// - `search` on an empty backend returns an empty `Vec`, not an error.
/// - `search` results are ordered by descending score and hold at most `top_k` items.
/// - after `clear`, the backend behaves as freshly created.
///
/// # Example
///
/// ```rust,ignore
/// use newsrag::{InMemoryBackend, VectorBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.add(&documents).await?;
/// let results = backend.search(&query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// A short backend name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Store documents. Documents sharing an id are not merged.
    async fn add(&self, documents: &[Document]) -> Result<()>;

    /// Search for the `top_k` most similar documents to the given embedding.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Remove every stored document.
    async fn clear(&self) -> Result<()>;

    /// Return the number of stored documents.
    async fn count(&self) -> Result<usize>;
}
