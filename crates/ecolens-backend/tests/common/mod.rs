//! Shared helpers for ecolens-backend integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ecolens_backend::{DatasetRecord, EngineOptions, InMemoryIndex, SearchEngine};
use ecolens_search::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
use tempfile::TempDir;

pub const DIM: usize = 4;

/// Deterministic embedder: texts registered with [`StubEmbedder::with`] map
/// to their vector, every other text to the zero vector (similarity 0).
pub struct StubEmbedder {
    dim: usize,
    vectors: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            vectors: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dim);
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, texts: Vec<String>) -> ecolens_search::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                self.vectors
                    .get(t)
                    .cloned()
                    .unwrap_or_else(|| vec![0.0; self.dim])
            })
            .collect())
    }

    async fn check_status(&self) -> ecolens_search::Result<ProviderStatus> {
        Ok(ProviderStatus::healthy(EmbeddingProviderType::Local, "stub"))
    }

    async fn warmup(&self) -> ecolens_search::Result<()> {
        Ok(())
    }

    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Local
    }
}

/// Unit vector along the first axis: the query direction in these tests.
pub fn query_vector() -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[0] = 1.0;
    v
}

/// Unit vector whose cosine similarity with [`query_vector`] is `similarity`.
pub fn with_similarity(similarity: f32) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    v[0] = similarity;
    v[1] = (1.0 - similarity * similarity).max(0.0).sqrt();
    v
}

pub fn record(language: &str, component: &str, keywords: &[&str], observation: &str) -> DatasetRecord {
    DatasetRecord::new(
        language,
        component,
        keywords.iter().copied(),
        observation,
    )
}

/// Build an engine over in-memory records.
pub async fn engine(
    records: Vec<DatasetRecord>,
    embedder: StubEmbedder,
    options: EngineOptions,
) -> SearchEngine {
    let embedder = Arc::new(embedder);
    let index = InMemoryIndex::from_records(records, embedder.as_ref())
        .await
        .expect("in-memory index");
    SearchEngine::new(Arc::new(index), embedder, options)
}

/// Write `content` to a file in `dir`.
pub fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write test file");
    path
}

/// Collection name unique to one test run.
pub fn unique_collection(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!("{}_{}", prefix, nanos)
}
