//! Shared test helpers: an in-process engine with injectable failures.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use newsrag::{
    Document, EngineConnection, EngineRow, EngineTable, RawRow, Result, StoreError, VectorEngine,
    cosine_similarity,
};
use serde_json::{Value, json};

/// Shared state of a [`MockEngine`], inspectable from tests.
#[derive(Default)]
pub struct MockState {
    pub fail_connect: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_create: AtomicBool,
    pub fail_insert: AtomicBool,
    pub fail_search: AtomicBool,
    pub fail_drop: AtomicBool,
    pub connects: AtomicUsize,
    pub collections: Mutex<HashMap<String, Arc<MockTable>>>,
    /// Rows appended verbatim to every search response.
    pub injected_rows: Mutex<Vec<RawRow>>,
}

impl MockState {
    pub fn set(flag: &AtomicBool) {
        flag.store(true, Ordering::SeqCst);
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn rows_in(&self, name: &str) -> usize {
        self.collections
            .lock()
            .unwrap()
            .get(name)
            .map(|table| table.rows.lock().unwrap().len())
            .unwrap_or(0)
    }

    fn check(&self, flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::backend("mock", format!("{what} failed")));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockEngine {
    pub state: Arc<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorEngine for MockEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn connect(&self, _path: &Path) -> Result<Arc<dyn EngineConnection>> {
        self.state.check(&self.state.fail_connect, "connect")?;
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection { state: self.state.clone() }))
    }
}

struct MockConnection {
    state: Arc<MockState>,
}

#[async_trait]
impl EngineConnection for MockConnection {
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.state.check(&self.state.fail_list, "list")?;
        Ok(self.state.collection_names())
    }

    async fn open_collection(&self, name: &str) -> Result<Arc<dyn EngineTable>> {
        let table = self.state.collections.lock().unwrap().get(name).cloned();
        match table {
            Some(table) => Ok(table),
            None => Err(StoreError::backend("mock", format!("no collection '{name}'"))),
        }
    }

    async fn create_collection(
        &self,
        name: &str,
        initial_rows: Vec<EngineRow>,
    ) -> Result<Arc<dyn EngineTable>> {
        self.state.check(&self.state.fail_create, "create")?;
        assert!(!initial_rows.is_empty(), "collections are never created empty");
        let table = Arc::new(MockTable { state: self.state.clone(), rows: Mutex::new(initial_rows) });
        self.state.collections.lock().unwrap().insert(name.to_string(), table.clone());
        Ok(table)
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        self.state.check(&self.state.fail_drop, "drop")?;
        self.state.collections.lock().unwrap().remove(name);
        Ok(())
    }
}

pub struct MockTable {
    state: Arc<MockState>,
    pub rows: Mutex<Vec<EngineRow>>,
}

#[async_trait]
impl EngineTable for MockTable {
    async fn insert(&self, rows: Vec<EngineRow>) -> Result<()> {
        self.state.check(&self.state.fail_insert, "insert")?;
        self.rows.lock().unwrap().extend(rows);
        Ok(())
    }

    async fn nearest_neighbors(&self, vector: &[f32], k: usize) -> Result<Vec<RawRow>> {
        self.state.check(&self.state.fail_search, "search")?;
        let rows = self.rows.lock().unwrap();
        let mut scored: Vec<(f32, &EngineRow)> =
            rows.iter().map(|row| (1.0 - cosine_similarity(vector, &row.vector), row)).collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut out: Vec<RawRow> = self.state.injected_rows.lock().unwrap().clone();
        out.extend(scored.into_iter().take(k).map(|(distance, row)| {
            let mut raw = row.columns.clone();
            raw.insert("id".into(), Value::String(row.id.clone()));
            raw.insert("text".into(), Value::String(row.text.clone()));
            raw.insert("vector".into(), json!(row.vector));
            raw.insert("_distance".into(), json!(distance));
            raw
        }));
        Ok(out)
    }

    async fn count_rows(&self) -> Result<usize> {
        Ok(self.rows.lock().unwrap().len())
    }
}

pub fn doc(id: &str, embedding: Vec<f32>) -> Document {
    Document {
        id: id.to_string(),
        text: format!("article {id}"),
        embedding,
        metadata: json!({ "title": format!("Title {id}"), "source": "wire" })
            .as_object()
            .cloned()
            .unwrap_or_default(),
    }
}
