//! # News RAG Example
//!
//! Ingests a handful of news articles into a [`VectorStore`], then retrieves
//! context for a few reader questions.
//!
//! Uses a deterministic `HashingEmbeddingProvider` so it runs with **zero API
//! keys**. Without the `lancedb` feature the store reports the persistent
//! engine as unavailable and runs in memory.
//!
//! Run: `cargo run --example news_rag`
//! Persistent: `cargo run --example news_rag --features lancedb`
//!
//! `NEWSRAG_DATA_DIR`, `NEWSRAG_COLLECTION` and `NEWSRAG_TOP_K` override the
//! store defaults. `RUST_LOG=newsrag=debug` shows backend decisions.

use std::sync::Arc;

use newsrag::{
    EmbeddingProvider, RawDocument, RetrievalConfig, RetrievalPipeline, StoreConfig, VectorStore,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// HashingEmbeddingProvider: bag-of-words feature hashing for demos
// ---------------------------------------------------------------------------

struct HashingEmbeddingProvider {
    dimensions: usize,
}

impl HashingEmbeddingProvider {
    fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> newsrag::Result<Vec<f32>> {
        // Each lowercase word bumps one bucket, so texts sharing words point
        // in similar directions.
        let mut emb = vec![0.0f32; self.dimensions];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| w.len() > 2) {
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
            emb[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            emb.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(emb)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn article(id: &str, title: &str, source: &str, pub_date: &str, text: &str) -> RawDocument {
    let metadata = json!({
        "title": title,
        "link": format!("https://news.example.com/articles/{id}"),
        "pubDate": pub_date,
        "source": source,
    });
    RawDocument {
        id: id.into(),
        text: text.into(),
        metadata: metadata.as_object().cloned().unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsrag=info")),
        )
        .init();

    // -- 1. Open the store ------------------------------------------------
    let store = Arc::new(VectorStore::new(StoreConfig::from_env()?));
    store.init().await;
    println!("Vector store mode: {}", store.mode().await);

    // Start each run from an empty collection.
    store.clear().await;

    // -- 2. Build the pipeline --------------------------------------------
    let config = RetrievalConfig::builder()
        .top_k(store.config().default_top_k)
        .similarity_threshold(0.1)
        .max_context_chars(2000)
        .build()?;
    let pipeline = RetrievalPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(256)))
        .store(store.clone())
        .build()?;

    // -- 3. Ingest sample articles ----------------------------------------
    let articles = vec![
        article(
            "rust-2024",
            "Rust 2024 edition lands",
            "Tech Daily",
            "Thu, 20 Feb 2025 09:00:00 GMT",
            "The Rust 2024 edition is now stable. The release tightens unsafe rules, \
             reserves the gen keyword and changes how temporaries in tail expressions \
             are dropped.",
        ),
        article(
            "rates",
            "Central bank holds interest rates",
            "Markets Wire",
            "Wed, 19 Feb 2025 14:30:00 GMT",
            "The central bank held interest rates steady on Wednesday, citing cooling \
             inflation and a resilient labour market. Markets had priced in the pause.",
        ),
        article(
            "storm",
            "Storm brings heavy rain to the coast",
            "Weather Now",
            "Tue, 18 Feb 2025 18:15:00 GMT",
            "A winter storm brought heavy rain and strong winds to coastal towns. \
             Forecasters expect the weather to clear by the weekend.",
        ),
        article(
            "football",
            "Late goal settles the derby",
            "Sports Desk",
            "Mon, 17 Feb 2025 21:45:00 GMT",
            "A stoppage-time goal settled the city derby on Monday night, lifting the \
             home side to second in the league table.",
        ),
    ];

    let ingested = pipeline.ingest(&articles).await?;
    println!("Ingested {ingested} article(s); store holds {}", store.count().await);

    // -- 4. Retrieve context for reader questions -------------------------
    let questions = [
        "What changed in the Rust 2024 edition?",
        "Did the central bank change interest rates?",
        "Will the storm and rain clear soon?",
    ];

    for question in &questions {
        println!("\nQuestion: \"{question}\"");
        let results = pipeline.retrieve(question).await?;
        if results.is_empty() {
            println!("  (no relevant articles)");
            continue;
        }
        for (i, result) in results.iter().enumerate() {
            println!(
                "  {}. [score={:.4}] {} | {}",
                i + 1,
                result.score,
                result.id,
                result.metadata.title.as_deref().unwrap_or("Untitled"),
            );
        }
        println!("\n--- context ---\n{}\n---------------", pipeline.build_context(&results));
    }

    println!("\nDone.");
    Ok(())
}
