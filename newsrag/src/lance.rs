//! LanceDB engine for the persistent backend.
//!
//! Provides [`LanceEngine`], an implementation of the [`engine`](crate::engine)
//! traits using the [lancedb](https://docs.rs/lancedb) crate with Arrow
//! record batches. This module is only available when the `lancedb` feature
//! is enabled.
//!
//! Rows are stored with `id` and `text` as `Utf8`, the embedding as a
//! `FixedSizeList<Float32>` named `vector`, and one nullable column per
//! metadata key. Column types are inferred from the first batch: strings map
//! to `Utf8`, integers to `Int64`, other numbers to `Float64`, booleans to
//! `Boolean`, and nested values are stored as JSON text.
//!
//! Searches request [`DistanceType::Cosine`], which keeps `1 - distance` a
//! cosine similarity.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Float64Type, Int32Type, Int64Type};
use arrow_array::{
    Array, ArrayRef, BooleanArray, FixedSizeListArray, Float32Array, Float64Array, Int64Array,
    RecordBatch, RecordBatchIterator, StringArray, new_null_array,
};
use arrow_schema::{ArrowError, DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use serde_json::Value;
use tracing::debug;

use crate::engine::{
    EngineConnection, EngineRow, EngineTable, ID_COLUMN, RawRow, TEXT_COLUMN, VECTOR_COLUMN,
    VectorEngine,
};
use crate::error::{Result, StoreError};

const BACKEND: &str = "lancedb";

fn map_err(e: lancedb::Error) -> StoreError {
    StoreError::backend(BACKEND, e.to_string())
}

fn map_arrow_err(e: ArrowError) -> StoreError {
    StoreError::backend(BACKEND, e.to_string())
}

/// A [`VectorEngine`] backed by an embedded [LanceDB](https://lancedb.com/)
/// database directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct LanceEngine;

impl LanceEngine {
    /// Create a new LanceDB engine.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VectorEngine for LanceEngine {
    fn name(&self) -> &'static str {
        BACKEND
    }

    async fn connect(&self, path: &Path) -> Result<Arc<dyn EngineConnection>> {
        let uri = path.to_str().ok_or_else(|| {
            StoreError::backend(BACKEND, format!("path is not valid UTF-8: {}", path.display()))
        })?;
        let connection = lancedb::connect(uri).execute().await.map_err(map_err)?;
        debug!(uri, "connected to lancedb");
        Ok(Arc::new(LanceConnection { connection }))
    }
}

struct LanceConnection {
    connection: Connection,
}

#[async_trait]
impl EngineConnection for LanceConnection {
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.connection.table_names().execute().await.map_err(map_err)
    }

    async fn open_collection(&self, name: &str) -> Result<Arc<dyn EngineTable>> {
        let table = self.connection.open_table(name).execute().await.map_err(map_err)?;
        Ok(Arc::new(LanceTable { table }))
    }

    async fn create_collection(
        &self,
        name: &str,
        initial_rows: Vec<EngineRow>,
    ) -> Result<Arc<dyn EngineTable>> {
        let schema = infer_schema(&initial_rows)?;
        let batch = rows_to_batch(schema.clone(), &initial_rows)?;
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        let table = self
            .connection
            .create_table(name, Box::new(reader))
            .execute()
            .await
            .map_err(map_err)?;
        debug!(collection = name, rows = initial_rows.len(), "created lancedb table");
        Ok(Arc::new(LanceTable { table }))
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.connection.drop_table(name).await.map_err(map_err)
    }
}

struct LanceTable {
    table: Table,
}

#[async_trait]
impl EngineTable for LanceTable {
    async fn insert(&self, rows: Vec<EngineRow>) -> Result<()> {
        let schema = self.table.schema().await.map_err(map_err)?;

        let unknown: BTreeSet<&str> = rows
            .iter()
            .flat_map(|row| row.columns.keys())
            .map(String::as_str)
            .filter(|key| schema.field_with_name(key).is_err())
            .collect();
        if !unknown.is_empty() {
            debug!(?unknown, "dropping metadata keys missing from table schema");
        }

        let batch = rows_to_batch(schema.clone(), &rows)?;
        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        self.table.add(Box::new(reader)).execute().await.map_err(map_err)?;
        Ok(())
    }

    async fn nearest_neighbors(&self, vector: &[f32], k: usize) -> Result<Vec<RawRow>> {
        let batches: Vec<RecordBatch> = self
            .table
            .query()
            .nearest_to(vector.to_vec())
            .map_err(map_err)?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(map_err)?
            .try_collect()
            .await
            .map_err(map_err)?;

        Ok(batches.iter().flat_map(batch_rows).collect())
    }

    async fn count_rows(&self) -> Result<usize> {
        self.table.count_rows(None).await.map_err(map_err)
    }
}

/// Arrow type for a single metadata value, `None` for null.
fn value_type(value: &Value) -> Option<DataType> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(DataType::Boolean),
        Value::Number(n) if n.is_i64() => Some(DataType::Int64),
        Value::Number(_) => Some(DataType::Float64),
        Value::String(_) | Value::Array(_) | Value::Object(_) => Some(DataType::Utf8),
    }
}

fn merge_types(current: DataType, next: DataType) -> DataType {
    match (current, next) {
        (a, b) if a == b => a,
        (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => {
            DataType::Float64
        }
        _ => DataType::Utf8,
    }
}

/// Build the table schema from the first batch of rows.
fn infer_schema(rows: &[EngineRow]) -> Result<SchemaRef> {
    let first = rows
        .first()
        .ok_or_else(|| StoreError::backend(BACKEND, "cannot create a table from zero rows"))?;
    let dim = i32::try_from(first.vector.len())
        .map_err(|_| StoreError::backend(BACKEND, "embedding dimension too large"))?;

    let mut metadata: BTreeMap<&str, Option<DataType>> = BTreeMap::new();
    for row in rows {
        for (key, value) in &row.columns {
            let slot = metadata.entry(key.as_str()).or_default();
            *slot = match (slot.take(), value_type(value)) {
                (None, next) => next,
                (current, None) => current,
                (Some(current), Some(next)) => Some(merge_types(current, next)),
            };
        }
    }

    let mut fields = vec![
        Field::new(ID_COLUMN, DataType::Utf8, false),
        Field::new(TEXT_COLUMN, DataType::Utf8, false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim),
            false,
        ),
    ];
    fields.extend(metadata.into_iter().map(|(key, data_type)| {
        Field::new(key, data_type.unwrap_or(DataType::Utf8), true)
    }));

    Ok(Arc::new(Schema::new(fields)))
}

/// Convert rows into a record batch matching `schema`.
fn rows_to_batch(schema: SchemaRef, rows: &[EngineRow]) -> Result<RecordBatch> {
    let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let array: ArrayRef = match field.name().as_str() {
            ID_COLUMN => {
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.id.as_str())))
            }
            TEXT_COLUMN => {
                Arc::new(StringArray::from_iter_values(rows.iter().map(|r| r.text.as_str())))
            }
            VECTOR_COLUMN => vector_array(field, rows)?,
            name => metadata_array(field.data_type(), rows, name),
        };
        columns.push(array);
    }
    RecordBatch::try_new(schema, columns).map_err(map_arrow_err)
}

fn vector_array(field: &Field, rows: &[EngineRow]) -> Result<ArrayRef> {
    let DataType::FixedSizeList(item, dim) = field.data_type() else {
        return Err(StoreError::backend(BACKEND, "vector column is not a fixed-size list"));
    };
    let expected = *dim as usize;

    let mut values = Vec::with_capacity(rows.len() * expected);
    for row in rows {
        if row.vector.len() != expected {
            return Err(StoreError::backend(
                BACKEND,
                format!(
                    "embedding for '{}' has {} dimensions, table expects {expected}",
                    row.id,
                    row.vector.len()
                ),
            ));
        }
        values.extend_from_slice(&row.vector);
    }

    let list =
        FixedSizeListArray::try_new(item.clone(), *dim, Arc::new(Float32Array::from(values)), None)
            .map_err(map_arrow_err)?;
    Ok(Arc::new(list))
}

fn metadata_array(data_type: &DataType, rows: &[EngineRow], key: &str) -> ArrayRef {
    let values = rows.iter().map(|row| row.columns.get(key).filter(|v| !v.is_null()));
    match data_type {
        DataType::Utf8 => Arc::new(StringArray::from(
            values
                .map(|v| {
                    v.map(|v| match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                })
                .collect::<Vec<Option<String>>>(),
        )),
        DataType::Int64 => Arc::new(Int64Array::from(
            values.map(|v| v.and_then(Value::as_i64)).collect::<Vec<Option<i64>>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            values.map(|v| v.and_then(Value::as_f64)).collect::<Vec<Option<f64>>>(),
        )),
        DataType::Boolean => Arc::new(BooleanArray::from(
            values.map(|v| v.and_then(Value::as_bool)).collect::<Vec<Option<bool>>>(),
        )),
        other => new_null_array(other, rows.len()),
    }
}

/// Decode a result batch into untyped rows. Columns of unsupported types
/// (such as the vector itself) are left out.
fn batch_rows(batch: &RecordBatch) -> Vec<RawRow> {
    let schema = batch.schema();
    let mut rows = vec![RawRow::new(); batch.num_rows()];
    for (field, column) in schema.fields().iter().zip(batch.columns()) {
        for (i, row) in rows.iter_mut().enumerate() {
            if let Some(value) = cell_value(column, i) {
                row.insert(field.name().clone(), value);
            }
        }
    }
    rows
}

fn cell_value(column: &ArrayRef, i: usize) -> Option<Value> {
    if column.is_null(i) {
        return None;
    }
    let value = match column.data_type() {
        DataType::Utf8 => Value::String(column.as_string::<i32>().value(i).to_string()),
        DataType::LargeUtf8 => Value::String(column.as_string::<i64>().value(i).to_string()),
        DataType::Boolean => Value::Bool(column.as_boolean().value(i)),
        DataType::Int32 => Value::from(column.as_primitive::<Int32Type>().value(i)),
        DataType::Int64 => Value::from(column.as_primitive::<Int64Type>().value(i)),
        DataType::Float32 => Value::from(f64::from(column.as_primitive::<Float32Type>().value(i))),
        DataType::Float64 => Value::from(column.as_primitive::<Float64Type>().value(i)),
        _ => return None,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn row(id: &str, vector: Vec<f32>, columns: Value) -> EngineRow {
        EngineRow {
            id: id.to_string(),
            text: format!("text {id}"),
            vector,
            columns: columns.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn infers_column_types_from_first_batch() {
        let rows = vec![
            row("a", vec![1.0, 0.0], json!({ "title": "A", "views": 3, "score": 1 })),
            row("b", vec![0.0, 1.0], json!({ "score": 0.5, "tags": ["x"], "empty": null })),
        ];
        let schema = infer_schema(&rows).unwrap();

        assert_eq!(schema.field_with_name("id").unwrap().data_type(), &DataType::Utf8);
        assert!(matches!(
            schema.field_with_name("vector").unwrap().data_type(),
            DataType::FixedSizeList(_, 2)
        ));
        assert_eq!(schema.field_with_name("title").unwrap().data_type(), &DataType::Utf8);
        assert_eq!(schema.field_with_name("views").unwrap().data_type(), &DataType::Int64);
        assert_eq!(schema.field_with_name("score").unwrap().data_type(), &DataType::Float64);
        assert_eq!(schema.field_with_name("tags").unwrap().data_type(), &DataType::Utf8);
        assert_eq!(schema.field_with_name("empty").unwrap().data_type(), &DataType::Utf8);
    }

    #[test]
    fn batch_round_trips_through_raw_rows() {
        let rows = vec![row("a", vec![1.0, 0.0], json!({ "title": "A", "views": 3 }))];
        let schema = infer_schema(&rows).unwrap();
        let batch = rows_to_batch(schema, &rows).unwrap();

        let decoded = batch_rows(&batch);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0]["id"], json!("a"));
        assert_eq!(decoded[0]["title"], json!("A"));
        assert_eq!(decoded[0]["views"], json!(3));
        assert!(!decoded[0].contains_key("vector"));
    }

    #[test]
    fn rejects_rows_with_wrong_dimension() {
        let first = vec![row("a", vec![1.0, 0.0], json!({}))];
        let schema = infer_schema(&first).unwrap();
        let bad = vec![row("b", vec![1.0, 0.0, 0.0], json!({}))];

        assert!(rows_to_batch(schema, &bad).is_err());
    }

    #[test]
    fn unknown_keys_are_not_in_batch() {
        let first = vec![row("a", vec![1.0], json!({ "title": "A" }))];
        let schema = infer_schema(&first).unwrap();
        let later = vec![row("b", vec![1.0], json!({ "category": "new" }))];

        let batch = rows_to_batch(schema, &later).unwrap();
        assert!(batch.schema().field_with_name("category").is_err());
        assert!(batch.column_by_name("title").unwrap().is_null(0));
    }

    #[tokio::test]
    async fn creates_searches_and_drops_a_table() {
        let dir = tempfile::tempdir().unwrap();
        let connection = LanceEngine::new().connect(dir.path()).await.unwrap();
        assert!(connection.list_collections().await.unwrap().is_empty());

        let table = connection
            .create_collection(
                "news",
                vec![
                    row("a", vec![1.0, 0.0], json!({ "title": "A" })),
                    row("b", vec![0.0, 1.0], json!({ "title": "B" })),
                ],
            )
            .await
            .unwrap();
        assert_eq!(table.count_rows().await.unwrap(), 2);

        let hits = table.nearest_neighbors(&[1.0, 0.0], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["id"], json!("a"));
        assert!(hits[0]["_distance"].as_f64().unwrap().abs() < 1e-4);

        assert_eq!(connection.list_collections().await.unwrap(), vec!["news".to_string()]);
        connection.drop_collection("news").await.unwrap();
        assert!(connection.list_collections().await.unwrap().is_empty());
    }
}
