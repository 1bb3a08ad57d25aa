//! In-memory knowledge base.
//!
//! Loads a dataset file once, embeds every observation and answers candidate
//! queries with a linear language filter. Entries are immutable after load and
//! shared by reference with every request.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ecolens_search::{normalize_language, EmbeddingProvider, ObservationEntry, SearchError};
use tracing::{debug, info};

use crate::dataset::{load_dataset, DatasetRecord, DatasetSource};
use crate::error::BackendError;
use crate::traits::KnowledgeBase;
use crate::types::{BackendKind, Candidate, CandidateQuery, KnowledgeBaseStatus};
use crate::Result;

/// Observations sent to the embedding provider per call
pub const EMBED_BATCH_SIZE: usize = 32;

/// Knowledge base held entirely in process memory.
///
/// Cloning is cheap: entries are shared.
#[derive(Clone)]
pub struct InMemoryIndex {
    entries: Arc<[Arc<ObservationEntry>]>,
    dimension: usize,
    source: Option<PathBuf>,
}

impl InMemoryIndex {
    /// Load, validate and embed a dataset file.
    ///
    /// # Errors
    /// Config-kind errors for a missing or malformed file, an invalid record
    /// or inconsistent embedding dimensions; the index is never built from
    /// part of the file.
    pub async fn load(source: &DatasetSource, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        let records = load_dataset(source)?;
        let mut index = Self::from_records(records, embedder).await?;
        index.source = Some(source.path.clone());
        Ok(index)
    }

    /// Build an index from records already in memory.
    pub async fn from_records(
        records: Vec<DatasetRecord>,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<Self> {
        for (index, record) in records.iter().enumerate() {
            record.validate(index)?;
        }

        let entries: Vec<ObservationEntry> =
            records.into_iter().map(DatasetRecord::into_entry).collect();
        let observations: Vec<String> = entries.iter().map(|e| e.observation.clone()).collect();

        let vectors = embed_observations(embedder, observations).await?;
        let dimension = check_dimensions(embedder.embedding_dim(), &vectors)?;

        let entries: Arc<[Arc<ObservationEntry>]> = entries
            .into_iter()
            .zip(vectors)
            .map(|(entry, vector)| Arc::new(entry.with_embedding(vector)))
            .collect();

        info!(
            "Built in-memory knowledge base: {} entries, dim={}",
            entries.len(),
            dimension
        );

        Ok(Self {
            entries,
            dimension,
            source: None,
        })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the knowledge base has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Embedding dimension shared by every entry.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// All entries, in dataset order.
    pub fn entries(&self) -> &[Arc<ObservationEntry>] {
        &self.entries
    }

    /// Dataset file this index was loaded from.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Entry count per language.
    pub fn languages(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in self.entries.iter() {
            *counts.entry(entry.language.clone()).or_default() += 1;
        }
        counts
    }
}

#[async_trait]
impl KnowledgeBase for InMemoryIndex {
    async fn candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>> {
        let language = normalize_language(&query.language);

        let candidates: Vec<Candidate> = self
            .entries
            .iter()
            .filter(|entry| entry.language == language)
            .map(|entry| Candidate::unscored(Arc::clone(entry)))
            .collect();

        debug!(
            "In-memory index: {} candidates for language '{}'",
            candidates.len(),
            language
        );
        Ok(candidates)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::InMemory
    }

    async fn status(&self) -> Result<KnowledgeBaseStatus> {
        let location = match &self.source {
            Some(path) => path.display().to_string(),
            None => "<in-process records>".to_string(),
        };

        Ok(KnowledgeBaseStatus {
            kind: BackendKind::InMemory,
            location,
            collection: None,
            entries: Some(self.entries.len() as u64),
            dimension: Some(self.dimension as u64),
            languages: self.languages().into_iter().collect(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }
}

impl std::fmt::Debug for InMemoryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryIndex")
            .field("entries", &self.entries.len())
            .field("dimension", &self.dimension)
            .field("source", &self.source)
            .finish()
    }
}

async fn embed_observations(
    embedder: &dyn EmbeddingProvider,
    observations: Vec<String>,
) -> Result<Vec<Vec<f32>>> {
    let total = observations.len();
    let mut vectors = Vec::with_capacity(total);

    for (i, batch) in observations.chunks(EMBED_BATCH_SIZE).enumerate() {
        debug!(
            "Embedding batch {}/{} ({} observations)",
            i + 1,
            total.div_ceil(EMBED_BATCH_SIZE),
            batch.len()
        );

        let embedded = embedder.embed(batch.to_vec()).await?;
        if embedded.len() != batch.len() {
            return Err(SearchError::Embedding(format!(
                "provider returned {} vectors for {} observations",
                embedded.len(),
                batch.len()
            ))
            .into());
        }
        vectors.extend(embedded);
    }

    Ok(vectors)
}

/// Every vector must have the provider's dimension, or the first vector's
/// when the provider does not report one.
fn check_dimensions(reported: usize, vectors: &[Vec<f32>]) -> Result<usize> {
    let expected = if reported != 0 {
        reported
    } else {
        vectors.first().map(Vec::len).unwrap_or(0)
    };

    if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
        return Err(BackendError::DimensionMismatch {
            expected,
            actual: bad.len(),
        });
    }

    Ok(expected)
}
