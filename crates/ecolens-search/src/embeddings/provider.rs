//! The embedding abstraction shared by the ingestion and query paths.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};

/// Which embedding implementation is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// Candle inference in process
    #[default]
    Local,
    /// Remote `/v1/embeddings` endpoint
    Openai,
}

impl std::fmt::Display for EmbeddingProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Openai => "openai",
        })
    }
}

/// Diagnostic snapshot reported by `ecolens status --provider`.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// Provider can produce embeddings
    pub available: bool,
    /// Implementation
    pub provider_type: EmbeddingProviderType,
    /// "CPU", "Metal", "CUDA" or "Remote"
    pub device: String,
    /// Model identifier
    pub model: Option<String>,
    /// Round trip of the probe request
    pub latency_ms: Option<u64>,
    /// No model load or first request is pending
    pub model_ready: bool,
    /// Why the provider is unavailable
    pub error: Option<String>,
}

impl ProviderStatus {
    /// Working provider on `device`.
    pub fn healthy(provider_type: EmbeddingProviderType, device: impl Into<String>) -> Self {
        Self {
            available: true,
            provider_type,
            device: device.into(),
            model: None,
            latency_ms: None,
            model_ready: true,
            error: None,
        }
    }

    /// Provider that cannot embed, with the reason.
    pub fn unavailable(provider_type: EmbeddingProviderType, error: impl Into<String>) -> Self {
        Self {
            available: false,
            device: "N/A".into(),
            model_ready: false,
            error: Some(error.into()),
            ..Self::healthy(provider_type, "")
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Available with nothing left to load.
    pub fn all_ready(&self) -> bool {
        self.available && self.model_ready
    }
}

/// Maps text to fixed-length vectors.
///
/// One provider is built at startup and shared behind `Arc` by every request,
/// so implementations must be `Send + Sync`. Equal input yields an equal
/// vector, and every vector a provider returns has the same length.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per text, in input order.
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Vector for a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(vec![text.to_owned()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SearchError::Embedding("provider returned no vector".into()))
    }

    /// Probe whether the provider can embed right now.
    async fn check_status(&self) -> Result<ProviderStatus>;

    /// Load the model or open the connection ahead of the first request.
    async fn warmup(&self) -> Result<()>;

    /// Vector length, or 0 while unknown.
    fn embedding_dim(&self) -> usize;

    fn provider_type(&self) -> EmbeddingProviderType;
}
