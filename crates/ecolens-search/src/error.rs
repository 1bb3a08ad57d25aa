//! Errors raised by the store, the providers and the ranking primitives.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    /// Qdrant rejected a request
    #[error("Qdrant error: {0}")]
    Qdrant(String),

    /// Qdrant could not be reached
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Local inference or a malformed provider answer
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Provider unreachable, timed out or answered with a server error
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Vector length differs from the one already established
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding endpoint refused the credentials
    #[error("Embedding endpoint rejected the API key: {0}")]
    Unauthorized(String),

    /// Embedding endpoint asked us to slow down
    #[error("Embedding endpoint rate limited the request (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    /// Embedding endpoint does not serve the configured model
    #[error("Embedding model not found: {0}")]
    ModelNotFound(String),
}

impl SearchError {
    /// Whether sending the same request again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderUnavailable(_) | Self::RateLimited { .. })
    }
}

impl From<qdrant_client::QdrantError> for SearchError {
    fn from(err: qdrant_client::QdrantError) -> Self {
        Self::Qdrant(err.to_string())
    }
}

impl From<candle_core::Error> for SearchError {
    fn from(err: candle_core::Error) -> Self {
        Self::Embedding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SearchError>;
