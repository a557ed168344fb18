//! Embedding provider boundary.
//!
//! Embedding generation lives outside this crate. The pipeline only needs a
//! function from text to a vector that may fail; [`EmbeddingProvider`] is that
//! function.

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into embedding vectors.
///
/// All vectors returned by one provider must have [`dimensions`] entries; the
/// vector store relies on a fixed dimensionality for the lifetime of the
/// process.
///
/// [`dimensions`]: EmbeddingProvider::dimensions
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, returning one vector per input in order.
    ///
    /// Defaults to calling [`embed`](EmbeddingProvider::embed) for each text
    /// in turn; providers with a native batch endpoint should override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Length of the vectors this provider produces.
    fn dimensions(&self) -> usize;
}
