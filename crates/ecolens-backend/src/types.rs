//! Shared types for backend operations.

use ecolens_config::ResultShape;
use ecolens_search::{normalize_language, RankedObservation};
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::Result;

pub use ecolens_search::Candidate;

/// Request for the candidates of one language.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    /// Normalized language identifier
    pub language: String,

    /// Query embedding (used by backends that score remotely)
    pub embedding: Vec<f32>,

    /// Number of results the caller wants after ranking
    pub limit: usize,
}

impl CandidateQuery {
    /// Create a new candidate query.
    pub fn new(language: impl Into<String>, embedding: Vec<f32>, limit: usize) -> Self {
        Self {
            language: language.into(),
            embedding,
            limit,
        }
    }
}

/// Which knowledge base implementation is serving requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Dataset file loaded and embedded in process
    InMemory,
    /// Qdrant collection
    External,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory => write!(f, "in-memory"),
            Self::External => write!(f, "external"),
        }
    }
}

/// Knowledge base status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseStatus {
    /// Backend implementation
    pub kind: BackendKind,

    /// Dataset path or Qdrant URL
    pub location: String,

    /// Collection name (external backend only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// Number of entries, when known
    pub entries: Option<u64>,

    /// Embedding dimension, when known
    pub dimension: Option<u64>,

    /// Entry count per language (in-memory backend only)
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub languages: Vec<(String, usize)>,
}

/// One suggestion returned to the caller.
///
/// The compact shape carries `component` and `observation`; the full shape
/// adds the remaining fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Category label
    pub component: String,

    /// Advice text
    pub observation: String,

    /// Entry language
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub language: Option<String>,

    /// Entry keywords
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub keywords: Option<Vec<String>>,

    /// Similarity used for ordering
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub score: Option<f32>,

    /// Whether a snippet token matched a keyword
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub keyword_match: Option<bool>,
}

impl Suggestion {
    /// Project a ranked observation into the requested shape.
    pub fn project(ranked: &RankedObservation, shape: ResultShape) -> Self {
        match shape {
            ResultShape::Compact => Self::compact(ranked),
            ResultShape::Full => Self::full(ranked),
        }
    }

    /// `component` and `observation` only.
    pub fn compact(ranked: &RankedObservation) -> Self {
        Self {
            component: ranked.entry.component.clone(),
            observation: ranked.entry.observation.clone(),
            language: None,
            keywords: None,
            score: None,
            keyword_match: None,
        }
    }

    /// Every field.
    pub fn full(ranked: &RankedObservation) -> Self {
        Self {
            language: Some(ranked.entry.language.clone()),
            keywords: Some(ranked.entry.keywords.clone()),
            score: Some(ranked.score),
            keyword_match: Some(ranked.keyword_match),
            ..Self::compact(ranked)
        }
    }
}

/// Search request as received from an external caller.
///
/// `limit` is signed so negative values can be rejected explicitly rather
/// than failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Code snippet to analyze
    pub snippet: String,

    /// Programming language of the snippet
    pub language: String,

    /// Maximum number of suggestions (configured default when absent)
    #[serde(default)]
    pub limit: Option<i64>,
}

impl SearchRequest {
    /// Create a new request.
    pub fn new(snippet: impl Into<String>, language: impl Into<String>, limit: i64) -> Self {
        Self {
            snippet: snippet.into(),
            language: language.into(),
            limit: Some(limit),
        }
    }

    /// Reject a request that no backend could answer.
    ///
    /// Needs no engine, so callers can check input before loading a model
    /// or a dataset.
    pub fn validate(&self) -> Result<()> {
        if self.snippet.trim().is_empty() {
            return Err(BackendError::validation(
                "snippet must be a non-empty string",
            ));
        }
        if normalize_language(&self.language).is_empty() {
            return Err(BackendError::validation(
                "language must be a non-empty string",
            ));
        }
        self.limit_or(0).map(|_| ())
    }

    /// The requested limit, or `default` when the request leaves it out.
    pub fn limit_or(&self, default: usize) -> Result<usize> {
        match self.limit {
            None => Ok(default),
            Some(limit) => usize::try_from(limit).map_err(|_| {
                BackendError::validation(format!("limit must be non-negative, got {}", limit))
            }),
        }
    }
}
