//! Knowledge base backed by a Qdrant collection.
//!
//! Similarity is computed by Qdrant; each candidate carries the remote cosine
//! score so the ranker never recomputes it.

use std::sync::Arc;

use async_trait::async_trait;
use ecolens_search::{normalize_language, QdrantStore, SearchError};
use tracing::{debug, info};

use crate::error::BackendError;
use crate::traits::KnowledgeBase;
use crate::types::{BackendKind, Candidate, CandidateQuery, KnowledgeBaseStatus};
use crate::Result;

/// Knowledge base served from a Qdrant collection.
pub struct QdrantIndex {
    store: Arc<QdrantStore>,
    collection: String,
    search_window: u64,
    vector_size: Option<u64>,
}

impl QdrantIndex {
    /// Connect to Qdrant and open the configured collection.
    ///
    /// # Errors
    /// * `BackendError::Connection` - server unreachable
    /// * `BackendError::CollectionNotFound` - collection has not been migrated yet
    pub async fn connect(config: &ecolens_config::QdrantConfig) -> Result<Self> {
        let store = QdrantStore::connect(store_config(config))
            .await
            .map_err(|e| match e {
                SearchError::Connection(message) => BackendError::Connection(message),
                other => other.into(),
            })?;

        Self::from_store(Arc::new(store), &config.collection, config.search_window).await
    }

    /// Open a collection on an existing store connection.
    pub async fn from_store(
        store: Arc<QdrantStore>,
        collection: impl Into<String>,
        search_window: u64,
    ) -> Result<Self> {
        let collection = collection.into();

        let summary = store
            .collection_info(&collection)
            .await?
            .ok_or_else(|| BackendError::collection_not_found(&collection))?;

        info!(
            "Opened Qdrant collection '{}' at {} ({} points, dim={:?})",
            collection,
            store.url(),
            summary.points_count.unwrap_or(0),
            summary.vector_size
        );

        Ok(Self {
            store,
            collection,
            search_window,
            vector_size: summary.vector_size,
        })
    }

    /// Collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Vector size the collection was created with.
    pub fn vector_size(&self) -> Option<u64> {
        self.vector_size
    }

    /// Minimum number of hits requested per search.
    pub fn search_window(&self) -> u64 {
        self.search_window
    }
}

#[async_trait]
impl KnowledgeBase for QdrantIndex {
    async fn candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>> {
        if query.embedding.is_empty() {
            return Err(BackendError::validation(
                "the external index needs a query embedding",
            ));
        }

        let language = normalize_language(&query.language);
        let window = candidate_window(query.limit, self.search_window);

        let hits = self
            .store
            .search_by_language(&self.collection, &language, query.embedding.clone(), window)
            .await?;

        debug!(
            "Qdrant index: {} candidates for language '{}' (window={})",
            hits.len(),
            language,
            window
        );

        Ok(hits
            .into_iter()
            .map(|hit| Candidate::scored(Arc::new(hit.entry), hit.score))
            .collect())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::External
    }

    async fn status(&self) -> Result<KnowledgeBaseStatus> {
        let summary = self
            .store
            .collection_info(&self.collection)
            .await?
            .ok_or_else(|| BackendError::collection_not_found(&self.collection))?;

        Ok(KnowledgeBaseStatus {
            kind: BackendKind::External,
            location: self.store.url().to_string(),
            collection: Some(self.collection.clone()),
            entries: summary.points_count,
            dimension: summary.vector_size,
            languages: Vec::new(),
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.store.collection_exists(&self.collection).await?)
    }
}

impl std::fmt::Debug for QdrantIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QdrantIndex")
            .field("url", &self.store.url())
            .field("collection", &self.collection)
            .field("search_window", &self.search_window)
            .field("vector_size", &self.vector_size)
            .finish()
    }
}

/// Store connection settings from the configured Qdrant section.
pub fn store_config(config: &ecolens_config::QdrantConfig) -> ecolens_search::QdrantConfig {
    let mut store = ecolens_search::QdrantConfig::with_url(config.url.clone());
    store.timeout_secs = config.timeout_secs;
    if let Some(key) = config.resolve_api_key() {
        store = store.api_key(key);
    }
    store
}

/// Hits requested from Qdrant: never fewer than the caller's limit.
pub fn candidate_window(limit: usize, search_window: u64) -> u64 {
    (limit as u64).max(search_window)
}
