//! # newsrag
//!
//! Vector storage and retrieval for a retrieval-augmented news chat service.
//!
//! ## Overview
//!
//! The center of the crate is [`VectorStore`], which stores embedded
//! documents and answers top-K similarity queries through one of two
//! backends:
//!
//! - [`PersistentBackend`] - a disk-backed nearest-neighbor engine reached
//!   through the [`engine`] traits (LanceDB with the `lancedb` feature)
//! - [`InMemoryBackend`] - an exact linear scan over documents held in memory
//!
//! The store tries the persistent backend on [`VectorStore::init`] and falls
//! back to memory for the rest of the process if it is unavailable or fails
//! later. Callers see the same API either way, and no store operation
//! returns an error.
//!
//! [`RetrievalPipeline`] builds on the store: it embeds documents and queries
//! with an [`EmbeddingProvider`] and formats results as model context.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use newsrag::{Document, StoreConfig, VectorStore};
//!
//! let store = Arc::new(VectorStore::new(StoreConfig::default()));
//! store.init().await;
//! store.add(&documents).await;
//! let results = store.search(&query_embedding, 3).await;
//! ```
//!
//! ## Features
//!
//! - `lancedb` - bundles [`lance::LanceEngine`](crate::lance) as the
//!   persistent engine used by [`VectorStore::new`]

#![warn(missing_docs)]

pub mod backend;
pub mod config;
pub mod document;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod inmemory;
#[cfg(feature = "lancedb")]
pub mod lance;
pub mod persistent;
pub mod pipeline;
pub mod similarity;
pub mod store;

pub use backend::VectorBackend;
pub use config::{RetrievalConfig, RetrievalConfigBuilder, StoreConfig, StoreConfigBuilder};
pub use document::{Document, Metadata, RawDocument, ResultMetadata, SearchResult};
pub use embedding::EmbeddingProvider;
pub use engine::{EngineConnection, EngineHit, EngineRow, EngineTable, RawRow, VectorEngine};
pub use error::{Result, StoreError};
pub use inmemory::InMemoryBackend;
#[cfg(feature = "lancedb")]
pub use lance::LanceEngine;
pub use persistent::PersistentBackend;
pub use pipeline::{RetrievalPipeline, RetrievalPipelineBuilder};
pub use similarity::cosine_similarity;
pub use store::{StoreMode, VectorStore};
