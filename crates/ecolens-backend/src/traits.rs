//! Knowledge base trait definition.
//!
//! Defines the async interface the search engine uses to obtain candidates.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::{BackendKind, Candidate, CandidateQuery, KnowledgeBaseStatus};

/// Source of language-filtered observation candidates.
///
/// Implemented by the in-memory index and the Qdrant-backed index. The
/// implementation is chosen once at construction and shared behind an
/// `Arc<dyn KnowledgeBase>`; implementations must be safe to query from
/// concurrent requests.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Candidates whose language equals `query.language`.
    ///
    /// # Returns
    /// Candidates in backend order. An unknown language yields an empty list.
    /// Backends that score remotely attach the score to each candidate.
    async fn candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>, BackendError>;

    /// Which implementation this is.
    fn kind(&self) -> BackendKind;

    /// Entry count, dimension and location.
    async fn status(&self) -> Result<KnowledgeBaseStatus, BackendError>;

    /// Check if the backend is reachable and usable.
    async fn health_check(&self) -> Result<bool, BackendError>;
}
