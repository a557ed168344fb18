//! Boundary to a disk-backed nearest-neighbor engine.
//!
//! The persistent backend talks to its engine only through the traits in this
//! module, so the engine can be swapped (or mocked in tests) without touching
//! the backend logic. `LanceEngine` (in the `lance` module) is the
//! bundled implementation behind the `lancedb` feature.
//!
//! Engines return search rows untyped; [`EngineHit::from_row`] turns them
//! into a typed hit and rejects rows that lack the required columns.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::document::Document;
use crate::error::Result;

/// Column holding the document id.
pub const ID_COLUMN: &str = "id";
/// Column holding the document text.
pub const TEXT_COLUMN: &str = "text";
/// Column holding the embedding.
pub const VECTOR_COLUMN: &str = "vector";
/// Column the engine adds to search rows with the query distance.
pub const DISTANCE_COLUMN: &str = "_distance";

/// Column names a metadata key may not shadow.
pub const RESERVED_COLUMNS: [&str; 4] = [ID_COLUMN, TEXT_COLUMN, VECTOR_COLUMN, DISTANCE_COLUMN];

/// An untyped row as returned by an engine search.
pub type RawRow = Map<String, Value>;

/// A flattened document ready for a columnar engine.
///
/// Engines have no nested map column, so metadata keys become sibling
/// columns next to `id`, `text` and `vector`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineRow {
    /// Document id, stored in [`ID_COLUMN`].
    pub id: String,
    /// Document text, stored in [`TEXT_COLUMN`].
    pub text: String,
    /// Embedding, stored in [`VECTOR_COLUMN`].
    pub vector: Vec<f32>,
    /// Metadata keys as sibling columns, reserved names removed.
    pub columns: Map<String, Value>,
}

impl EngineRow {
    /// Flatten a document. Metadata keys that collide with a reserved column
    /// are dropped.
    pub fn flatten(document: &Document) -> Self {
        let columns = document
            .metadata
            .iter()
            .filter(|(key, _)| !RESERVED_COLUMNS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self {
            id: document.id.clone(),
            text: document.text.clone(),
            vector: document.embedding.clone(),
            columns,
        }
    }
}

/// A typed search row parsed from a [`RawRow`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineHit {
    /// Document id.
    pub id: String,
    /// Document text.
    pub text: String,
    /// Query distance from [`DISTANCE_COLUMN`], if the engine reported one.
    pub distance: Option<f32>,
    /// Remaining non-reserved columns.
    pub columns: Map<String, Value>,
}

impl EngineHit {
    /// Parse a raw row. Returns `None` when `id` or `text` is missing or not
    /// a string.
    pub fn from_row(mut row: RawRow) -> Option<Self> {
        let id = match row.remove(ID_COLUMN)? {
            Value::String(s) => s,
            _ => return None,
        };
        let text = match row.remove(TEXT_COLUMN)? {
            Value::String(s) => s,
            _ => return None,
        };
        let distance = row.remove(DISTANCE_COLUMN).and_then(|v| v.as_f64()).map(|d| d as f32);
        row.remove(VECTOR_COLUMN);
        row.retain(|_, value| !value.is_null());
        Some(Self { id, text, distance, columns: row })
    }

    /// Convert the engine distance into a similarity score.
    ///
    /// Assumes cosine distance (`1 - cosine`), so `1 - d` recovers the cosine
    /// similarity. Switching the engine to another metric changes what the
    /// score means. Rows without a distance score `0`.
    pub fn score(&self) -> f32 {
        self.distance.map(|d| 1.0 - d).unwrap_or(0.0)
    }
}

/// Entry point of a persistent engine: opens a database directory.
#[async_trait]
pub trait VectorEngine: Send + Sync {
    /// A short engine name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Connect to the database stored in `path`. The directory exists.
    async fn connect(&self, path: &Path) -> Result<Arc<dyn EngineConnection>>;
}

/// An open database holding named collections.
#[async_trait]
pub trait EngineConnection: Send + Sync {
    /// List the names of existing collections.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Open an existing collection.
    async fn open_collection(&self, name: &str) -> Result<Arc<dyn EngineTable>>;

    /// Create a collection whose schema is inferred from `initial_rows`.
    ///
    /// `initial_rows` is never empty; engines cannot create an empty
    /// collection without a schema.
    async fn create_collection(
        &self,
        name: &str,
        initial_rows: Vec<EngineRow>,
    ) -> Result<Arc<dyn EngineTable>>;

    /// Drop a collection and its data.
    async fn drop_collection(&self, name: &str) -> Result<()>;
}

/// A handle to one collection.
#[async_trait]
pub trait EngineTable: Send + Sync {
    /// Append rows. Columns not present in the collection schema may be
    /// dropped or rejected, depending on the engine.
    async fn insert(&self, rows: Vec<EngineRow>) -> Result<()>;

    /// Return up to `k` rows nearest to `vector`, each carrying a
    /// [`DISTANCE_COLUMN`] when the engine reports one.
    async fn nearest_neighbors(&self, vector: &[f32], k: usize) -> Result<Vec<RawRow>>;

    /// Count stored rows.
    async fn count_rows(&self) -> Result<usize>;
}
