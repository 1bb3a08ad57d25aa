//! Backend error types.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`BackendError`].
///
/// Callers use it to decide how a failure surfaces: validation errors are
/// the caller's fault, configuration errors are fatal at startup, backend
/// errors are per-request failures of a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request
    Validation,
    /// Missing or malformed configuration or dataset
    Config,
    /// External index or embedding failure
    Backend,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Config => write!(f, "config"),
            Self::Backend => write!(f, "backend"),
        }
    }
}

/// Errors that can occur during backend operations.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Request rejected before any work was done
    #[error("invalid request: {0}")]
    Validation(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ecolens_config::ConfigError),

    /// Dataset file missing or unreadable
    #[error("dataset '{path}': {message}")]
    Dataset { path: PathBuf, message: String },

    /// A dataset record failed validation
    #[error("invalid dataset record {index}: {message}")]
    InvalidRecord { index: usize, message: String },

    /// Embedding dimension differs from the knowledge base dimension
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// External collection does not exist
    #[error("collection '{0}' not found. Run 'ecolens migrate' to create it.")]
    CollectionNotFound(String),

    /// Connection error
    #[error("connection failed: {0}")]
    Connection(String),

    /// Search, embedding or Qdrant operation failed
    #[error("search failed: {0}")]
    Search(#[from] ecolens_search::SearchError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BackendError {
    /// Create a Validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a Dataset error.
    pub fn dataset(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Dataset {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an InvalidRecord error.
    pub fn invalid_record(index: usize, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            index,
            message: message.into(),
        }
    }

    /// Create a CollectionNotFound error.
    pub fn collection_not_found(name: impl Into<String>) -> Self {
        Self::CollectionNotFound(name.into())
    }

    /// Create a Connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Config(_)
            | Self::Dataset { .. }
            | Self::InvalidRecord { .. }
            | Self::DimensionMismatch { .. } => ErrorKind::Config,
            Self::CollectionNotFound(_)
            | Self::Connection(_)
            | Self::Search(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorKind::Backend,
        }
    }
}
