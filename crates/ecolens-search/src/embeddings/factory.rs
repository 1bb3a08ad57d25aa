//! Builds the configured embedding provider.

use std::sync::Arc;

use crate::error::{Result, SearchError};

use super::local::{LocalConfig, LocalProvider};
use super::openai::{OpenAIConfig, OpenAIProvider};
use super::provider::{EmbeddingProvider, EmbeddingProviderType};

/// Provider selection plus the settings of each implementation.
///
/// With `provider = Openai` and no `openai` section, the endpoint comes from
/// the `ECOLENS_OPENAI_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderType,
    pub local: LocalConfig,
    pub openai: Option<OpenAIConfig>,
}

impl EmbeddingConfig {
    /// Default local model.
    pub fn local() -> Self {
        Self::default()
    }

    pub fn local_with_config(local: LocalConfig) -> Self {
        Self {
            local,
            ..Self::default()
        }
    }

    pub fn openai_with_config(openai: OpenAIConfig) -> Self {
        Self {
            openai: Some(openai),
            ..Self::openai()
        }
    }

    /// Remote provider configured from the environment.
    pub fn openai() -> Self {
        Self {
            provider: EmbeddingProviderType::Openai,
            ..Self::default()
        }
    }
}

/// Fail when a provider reports a dimension other than `expected`.
///
/// A Qdrant collection has one fixed vector size. Providers that do not know
/// their dimension yet (0) pass; the first response settles it.
pub fn validate_dimension(provider: &dyn EmbeddingProvider, expected: usize) -> Result<()> {
    match provider.embedding_dim() {
        0 => Ok(()),
        actual if actual == expected => Ok(()),
        actual => Err(SearchError::DimensionMismatch { expected, actual }),
    }
}

/// Construct the provider named by `config`, ready to share across tasks.
pub fn create(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider {
        EmbeddingProviderType::Local => Arc::new(LocalProvider::with_config(config.local.clone())?),
        EmbeddingProviderType::Openai => Arc::new(match &config.openai {
            Some(openai) => OpenAIProvider::new(openai.clone())?,
            None => OpenAIProvider::from_env()?,
        }),
    };
    Ok(provider)
}
