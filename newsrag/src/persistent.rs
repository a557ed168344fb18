//! Persistent vector backend over a disk-backed engine.
//!
//! [`PersistentBackend`] implements [`VectorBackend`] on top of the traits in
//! [`engine`](crate::engine). It owns one named collection and creates it
//! lazily: engines infer the collection schema from the first batch of rows,
//! so nothing is created until the first `add`.
//!
//! # Example
//!
//! ```rust,ignore
//! use newsrag::PersistentBackend;
//! use newsrag::lance::LanceEngine;
//!
//! let backend =
//!     PersistentBackend::connect(&LanceEngine::new(), "data/lancedb", "news_articles").await?;
//! backend.add(&documents).await?;
//! let results = backend.search(&query_embedding, 3).await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::VectorBackend;
use crate::document::{Document, ResultMetadata, SearchResult};
use crate::engine::{EngineConnection, EngineHit, EngineRow, EngineTable, VectorEngine};
use crate::error::{Result, StoreError};

/// A [`VectorBackend`] backed by a persistent [`VectorEngine`].
///
/// The table handle is `None` until the collection exists, either because it
/// was found at connect time or because the first `add` created it.
pub struct PersistentBackend {
    engine: &'static str,
    path: PathBuf,
    connection: Arc<dyn EngineConnection>,
    collection: String,
    table: RwLock<Option<Arc<dyn EngineTable>>>,
}

impl PersistentBackend {
    /// Connect to the engine database in `path` and open `collection` if it
    /// exists.
    ///
    /// The directory is created when missing. Any failure is reported as
    /// [`StoreError::ConnectFailure`].
    pub async fn connect(
        engine: &dyn VectorEngine,
        path: impl AsRef<Path>,
        collection: impl Into<String>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let collection = collection.into();
        let connect_err = |message: String| StoreError::ConnectFailure {
            path: path.clone(),
            message,
        };

        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|e| connect_err(format!("failed to create directory: {e}")))?;

        let connection = engine.connect(&path).await.map_err(|e| connect_err(e.to_string()))?;

        let existing =
            connection.list_collections().await.map_err(|e| connect_err(e.to_string()))?;
        let table = if existing.iter().any(|name| *name == collection) {
            let table = connection
                .open_collection(&collection)
                .await
                .map_err(|e| connect_err(e.to_string()))?;
            info!(engine = engine.name(), collection = %collection, "opened existing collection");
            Some(table)
        } else {
            info!(
                engine = engine.name(),
                collection = %collection,
                "collection not found, it will be created on first add"
            );
            None
        };

        Ok(Self {
            engine: engine.name(),
            path,
            connection,
            collection,
            table: RwLock::new(table),
        })
    }

    /// The directory holding the engine database.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The name of the collection this backend manages.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Whether the collection currently exists.
    pub async fn has_collection(&self) -> bool {
        self.table.read().await.is_some()
    }

    fn write_err(&self, e: StoreError) -> StoreError {
        StoreError::WriteFailure { backend: self.engine.to_string(), message: e.to_string() }
    }
}

#[async_trait]
impl VectorBackend for PersistentBackend {
    fn name(&self) -> &'static str {
        self.engine
    }

    async fn add(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let rows: Vec<EngineRow> = documents.iter().map(EngineRow::flatten).collect();
        let count = rows.len();

        let mut table = self.table.write().await;
        match table.as_ref() {
            Some(existing) => {
                existing.insert(rows).await.map_err(|e| self.write_err(e))?;
            }
            None => {
                let created = self
                    .connection
                    .create_collection(&self.collection, rows)
                    .await
                    .map_err(|e| self.write_err(e))?;
                info!(collection = %self.collection, count, "created collection from first batch");
                *table = Some(created);
            }
        }

        debug!(collection = %self.collection, count, "inserted rows");
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let Some(table) = self.table.read().await.clone() else {
            debug!(collection = %self.collection, "search before collection exists");
            return Ok(Vec::new());
        };
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let rows = table.nearest_neighbors(embedding, top_k).await.map_err(|e| {
            StoreError::ReadFailure { backend: self.engine.to_string(), message: e.to_string() }
        })?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            match EngineHit::from_row(row) {
                Some(hit) => {
                    let score = hit.score();
                    results.push(SearchResult {
                        metadata: ResultMetadata::project(&hit.columns),
                        id: hit.id,
                        text: hit.text,
                        score,
                    });
                }
                None => warn!(collection = %self.collection, "skipping row without id or text"),
            }
        }
        results.truncate(top_k);
        Ok(results)
    }

    async fn clear(&self) -> Result<()> {
        let mut table = self.table.write().await;
        if table.is_none() {
            return Ok(());
        }
        self.connection
            .drop_collection(&self.collection)
            .await
            .map_err(|e| self.write_err(e))?;
        *table = None;
        info!(collection = %self.collection, "dropped collection");
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        match self.table.read().await.clone() {
            Some(table) => table.count_rows().await,
            None => Ok(0),
        }
    }
}

impl std::fmt::Debug for PersistentBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentBackend")
            .field("engine", &self.engine)
            .field("path", &self.path)
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}
