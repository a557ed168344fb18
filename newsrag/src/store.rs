//! Vector store orchestrator.
//!
//! The [`VectorStore`] picks a backend on initialization and routes every
//! later call to it. It prefers the persistent engine and falls back to the
//! in-memory backend when the engine is missing or fails. The fallback is
//! one-way: once in memory, the store stays there until the process restarts,
//! so documents are never split between a resurrected disk collection and
//! memory.
//!
//! None of the public operations return errors. Failed writes downgrade the
//! store and land in memory; failed reads return no results.
//!
//! # Example
//!
//! ```rust,ignore
//! use newsrag::{StoreConfig, VectorStore};
//!
//! let store = VectorStore::new(StoreConfig::from_env()?);
//! store.init().await;
//! store.add(&documents).await;
//! let results = store.search(&query_embedding, 3).await;
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::backend::VectorBackend;
use crate::config::StoreConfig;
use crate::document::{Document, SearchResult};
use crate::engine::VectorEngine;
use crate::error::{Result, StoreError};
use crate::inmemory::InMemoryBackend;
use crate::persistent::PersistentBackend;

/// Which backend a [`VectorStore`] is routing to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreMode {
    /// `init` has not run yet.
    Uninitialized,
    /// Routing to the persistent engine.
    Persistent,
    /// Routing to the in-memory backend. Terminal.
    InMemory,
}

impl fmt::Display for StoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreMode::Uninitialized => "uninitialized",
            StoreMode::Persistent => "persistent",
            StoreMode::InMemory => "in-memory",
        };
        f.write_str(name)
    }
}

struct StoreState {
    mode: StoreMode,
    /// Set exactly when `mode` is [`StoreMode::Persistent`].
    persistent: Option<Arc<PersistentBackend>>,
}

/// The vector store used by the retrieval pipeline.
///
/// Construct one per process and share it behind an `Arc`. Mutating
/// operations (`init`, `add`, `clear` and downgrades) are serialized by a
/// single writer gate; `search` only holds a read lock long enough to pick
/// the active backend, so searches run concurrently with each other and with
/// writes.
pub struct VectorStore {
    config: StoreConfig,
    engine: Option<Arc<dyn VectorEngine>>,
    memory: Arc<InMemoryBackend>,
    state: RwLock<StoreState>,
    write_gate: Mutex<()>,
}

impl VectorStore {
    /// Create a store using the bundled persistent engine.
    ///
    /// Without the `lancedb` feature there is no bundled engine and the store
    /// falls back to memory on `init`.
    pub fn new(config: StoreConfig) -> Self {
        Self::build(config, default_engine())
    }

    /// Create a store using the given persistent engine.
    pub fn with_engine(config: StoreConfig, engine: Arc<dyn VectorEngine>) -> Self {
        Self::build(config, Some(engine))
    }

    /// Create a store that never attempts the persistent engine.
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::build(config, None)
    }

    fn build(config: StoreConfig, engine: Option<Arc<dyn VectorEngine>>) -> Self {
        Self {
            config,
            engine,
            memory: Arc::new(InMemoryBackend::new()),
            state: RwLock::new(StoreState { mode: StoreMode::Uninitialized, persistent: None }),
            write_gate: Mutex::new(()),
        }
    }

    /// Return a reference to the store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Return the current routing mode.
    pub async fn mode(&self) -> StoreMode {
        self.state.read().await.mode
    }

    /// Connect the persistent backend, or fall back to memory.
    ///
    /// Never fails: any error while loading the engine, creating the data
    /// directory, connecting, or opening the collection switches the store
    /// to [`StoreMode::InMemory`]. Calling `init` on an initialized store
    /// does nothing.
    pub async fn init(&self) {
        let _gate = self.write_gate.lock().await;
        self.init_locked().await;
    }

    /// Add documents to the active backend.
    ///
    /// An empty batch is a no-op. If the store is not initialized yet, it is
    /// initialized first. When the persistent backend rejects the batch, the
    /// store downgrades to memory and retries the same batch there; if that
    /// fails too the batch is dropped and logged.
    pub async fn add(&self, documents: &[Document]) {
        if documents.is_empty() {
            debug!("no documents to add");
            return;
        }
        let count = documents.len();

        let _gate = self.write_gate.lock().await;
        self.init_locked().await;

        let persistent = self.state.read().await.persistent.clone();
        if let Some(backend) = persistent {
            match backend.add(documents).await {
                Ok(()) => {
                    info!(count, mode = %StoreMode::Persistent, "added documents");
                    return;
                }
                Err(e) => {
                    error!(count, error = %e, "persistent write failed, switching to in-memory store");
                    self.downgrade().await;
                }
            }
        }

        match self.memory.add(documents).await {
            Ok(()) => info!(count, mode = %StoreMode::InMemory, "added documents"),
            Err(e) => {
                let e = StoreError::WriteFailure {
                    backend: self.memory.name().to_string(),
                    message: e.to_string(),
                };
                error!(count, error = %e, "dropping batch");
            }
        }
    }

    /// Search the active backend for the `top_k` documents closest to
    /// `embedding`.
    ///
    /// Backend failures are logged and produce an empty list; a failed
    /// search does not change the mode.
    pub async fn search(&self, embedding: &[f32], top_k: usize) -> Vec<SearchResult> {
        let backend = self.active_backend().await;
        match backend.search(embedding, top_k).await {
            Ok(results) => {
                debug!(backend = backend.name(), top_k, result_count = results.len(), "search completed");
                results
            }
            Err(e) => {
                error!(backend = backend.name(), error = %e, "search failed, returning no results");
                Vec::new()
            }
        }
    }

    /// Search with the configured `default_top_k`.
    pub async fn search_default(&self, embedding: &[f32]) -> Vec<SearchResult> {
        self.search(embedding, self.config.default_top_k).await
    }

    /// Remove every document from the active backend.
    ///
    /// An uninitialized store is initialized first, because a collection left
    /// on disk by an earlier process exists before anything is added in this
    /// one. Once initialized, clearing is a no-op when no collection exists.
    /// If dropping the persistent collection fails, the store downgrades to
    /// memory, which leaves it empty from the caller's point of view.
    pub async fn clear(&self) {
        let _gate = self.write_gate.lock().await;
        self.init_locked().await;

        let persistent = self.state.read().await.persistent.clone();
        if let Some(backend) = persistent {
            match backend.clear().await {
                Ok(()) => {
                    info!(mode = %StoreMode::Persistent, "cleared vector store");
                    return;
                }
                Err(e) => {
                    error!(error = %e, "failed to drop collection, switching to in-memory store");
                    self.downgrade().await;
                }
            }
        }

        match self.memory.clear().await {
            Ok(()) => info!(mode = %StoreMode::InMemory, "cleared vector store"),
            Err(e) => error!(error = %e, "failed to clear in-memory store"),
        }
    }

    /// Number of documents in the active backend; `0` if counting fails.
    pub async fn count(&self) -> usize {
        let backend = self.active_backend().await;
        backend.count().await.unwrap_or_else(|e| {
            warn!(backend = backend.name(), error = %e, "count failed");
            0
        })
    }

    /// Initialize if needed. Callers must hold `write_gate`.
    async fn init_locked(&self) {
        if self.state.read().await.mode != StoreMode::Uninitialized {
            return;
        }

        let (mode, persistent) = match self.connect_persistent().await {
            Ok(backend) => {
                info!(
                    path = %backend.path().display(),
                    collection = backend.collection(),
                    "using persistent vector store"
                );
                (StoreMode::Persistent, Some(Arc::new(backend)))
            }
            Err(e) => {
                warn!(error = %e, "persistent vector store unavailable, using in-memory store");
                (StoreMode::InMemory, None)
            }
        };

        let mut state = self.state.write().await;
        state.mode = mode;
        state.persistent = persistent;
    }

    async fn connect_persistent(&self) -> Result<PersistentBackend> {
        let engine = self.engine.as_ref().ok_or_else(|| {
            StoreError::CapabilityUnavailable("no persistent engine configured".to_string())
        })?;
        PersistentBackend::connect(
            engine.as_ref(),
            &self.config.data_dir,
            self.config.collection.as_str(),
        )
        .await
    }

    /// Switch to memory for the rest of the process. Callers must hold
    /// `write_gate`.
    async fn downgrade(&self) {
        let mut state = self.state.write().await;
        state.mode = StoreMode::InMemory;
        state.persistent = None;
    }

    async fn active_backend(&self) -> Arc<dyn VectorBackend> {
        {
            let state = self.state.read().await;
            if state.mode != StoreMode::Uninitialized {
                return self.route(&state);
            }
        }
        self.init().await;
        let state = self.state.read().await;
        self.route(&state)
    }

    fn route(&self, state: &StoreState) -> Arc<dyn VectorBackend> {
        match &state.persistent {
            Some(backend) => backend.clone() as Arc<dyn VectorBackend>,
            None => self.memory.clone() as Arc<dyn VectorBackend>,
        }
    }
}

impl fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStore")
            .field("config", &self.config)
            .field("engine", &self.engine.as_ref().map(|e| e.name()))
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "lancedb")]
fn default_engine() -> Option<Arc<dyn VectorEngine>> {
    Some(Arc::new(crate::lance::LanceEngine::new()))
}

#[cfg(not(feature = "lancedb"))]
fn default_engine() -> Option<Arc<dyn VectorEngine>> {
    None
}
