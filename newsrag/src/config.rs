//! Configuration for the vector store and the retrieval pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Default directory for the persistent engine database.
pub const DEFAULT_DATA_DIR: &str = "data/lancedb";

/// Default collection name.
pub const DEFAULT_COLLECTION: &str = "news_articles";

/// Default number of results returned by a search.
pub const DEFAULT_TOP_K: usize = 3;

/// Configuration parameters for the [`VectorStore`](crate::VectorStore).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Directory holding the persistent engine database.
    pub data_dir: PathBuf,
    /// Name of the single collection the store manages.
    pub collection: String,
    /// Number of results returned when a search does not specify `top_k`.
    pub default_top_k: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            collection: DEFAULT_COLLECTION.to_string(),
            default_top_k: DEFAULT_TOP_K,
        }
    }
}

impl StoreConfig {
    /// Create a new builder for constructing a [`StoreConfig`].
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Build a configuration from environment variables, falling back to
    /// defaults for unset ones.
    ///
    /// - `NEWSRAG_DATA_DIR` – engine database directory
    /// - `NEWSRAG_COLLECTION` – collection name
    /// - `NEWSRAG_TOP_K` – default result count
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if `NEWSRAG_TOP_K` is not a number or
    /// the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(dir) = lookup("NEWSRAG_DATA_DIR") {
            builder = builder.data_dir(dir);
        }
        if let Some(collection) = lookup("NEWSRAG_COLLECTION") {
            builder = builder.collection(collection);
        }
        if let Some(top_k) = lookup("NEWSRAG_TOP_K") {
            let top_k = top_k.trim().parse().map_err(|_| {
                StoreError::Config(format!("NEWSRAG_TOP_K must be a positive integer, got '{top_k}'"))
            })?;
            builder = builder.default_top_k(top_k);
        }
        builder.build()
    }
}

/// Builder for constructing a validated [`StoreConfig`].
#[derive(Debug, Clone, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Set the engine database directory.
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the number of results returned by default.
    pub fn default_top_k(mut self, k: usize) -> Self {
        self.config.default_top_k = k;
        self
    }

    /// Build the [`StoreConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if:
    /// - `collection` is empty
    /// - `default_top_k == 0`
    pub fn build(self) -> Result<StoreConfig> {
        if self.config.collection.trim().is_empty() {
            return Err(StoreError::Config("collection must not be empty".to_string()));
        }
        if self.config.default_top_k == 0 {
            return Err(StoreError::Config("default_top_k must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}

/// Configuration parameters for the [`RetrievalPipeline`](crate::RetrievalPipeline).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    /// Number of top results to retrieve per query.
    pub top_k: usize,
    /// Minimum similarity score for results (results below this are filtered out).
    pub similarity_threshold: f32,
    /// Upper bound on the length of the generated context, in characters.
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: DEFAULT_TOP_K, similarity_threshold: 0.0, max_context_chars: 8_000 }
    }
}

impl RetrievalConfig {
    /// Create a new builder for constructing a [`RetrievalConfig`].
    pub fn builder() -> RetrievalConfigBuilder {
        RetrievalConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RetrievalConfig`].
#[derive(Debug, Clone, Default)]
pub struct RetrievalConfigBuilder {
    config: RetrievalConfig,
}

impl RetrievalConfigBuilder {
    /// Set the number of top results to retrieve.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the minimum similarity threshold for filtering results.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    /// Set the maximum context length in characters.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = chars;
        self
    }

    /// Build the [`RetrievalConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if:
    /// - `top_k == 0`
    /// - `similarity_threshold` is outside `[-1, 1]`
    /// - `max_context_chars == 0`
    pub fn build(self) -> Result<RetrievalConfig> {
        if self.config.top_k == 0 {
            return Err(StoreError::Config("top_k must be greater than zero".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.config.similarity_threshold) {
            return Err(StoreError::Config(format!(
                "similarity_threshold ({}) must be within [-1, 1]",
                self.config.similarity_threshold
            )));
        }
        if self.config.max_context_chars == 0 {
            return Err(StoreError::Config(
                "max_context_chars must be greater than zero".to_string(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_match_deployment() {
        let config = StoreConfig::default();
        assert_eq!(config.collection, "news_articles");
        assert_eq!(config.default_top_k, 3);
        assert_eq!(config.data_dir, PathBuf::from("data/lancedb"));
    }

    #[test]
    fn builder_rejects_invalid_values() {
        assert!(StoreConfig::builder().collection(" ").build().is_err());
        assert!(StoreConfig::builder().default_top_k(0).build().is_err());
        assert!(RetrievalConfig::builder().top_k(0).build().is_err());
        assert!(RetrievalConfig::builder().similarity_threshold(1.5).build().is_err());
        assert!(RetrievalConfig::builder().max_context_chars(0).build().is_err());
    }

    #[test]
    fn reads_overrides_from_lookup() {
        let vars = HashMap::from([
            ("NEWSRAG_DATA_DIR", "/tmp/vectors"),
            ("NEWSRAG_COLLECTION", "articles"),
            ("NEWSRAG_TOP_K", " 5 "),
        ]);
        let config =
            StoreConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/vectors"));
        assert_eq!(config.collection, "articles");
        assert_eq!(config.default_top_k, 5);
    }

    #[test]
    fn rejects_non_numeric_top_k() {
        let err = StoreConfig::from_lookup(|key| (key == "NEWSRAG_TOP_K").then(|| "many".into()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }
}
