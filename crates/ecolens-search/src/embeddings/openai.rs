//! Remote embeddings over the OpenAI `/v1/embeddings` protocol.
//!
//! Works against OpenAI, Azure OpenAI (`api-key` header) and Ollama. The
//! request is `{"model": ..., "input": [...]}`; the response carries one
//! `{"embedding": [...], "index": n}` item per input, possibly out of order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[cfg(feature = "rate-limit")]
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
#[cfg(feature = "rate-limit")]
use std::num::NonZeroU32;

use super::provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};
use crate::error::{Result, SearchError};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const FIRST_BACKOFF: Duration = Duration::from_millis(500);

#[cfg(feature = "rate-limit")]
const DEFAULT_REQUESTS_PER_SECOND: u32 = 10;

/// Endpoint, credentials and model of a remote provider.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// API root, with or without the trailing `/v1`
    pub base_url: String,
    /// Bearer token (or `api-key` in Azure mode); Ollama needs none
    pub api_key: Option<String>,
    /// Model name sent with every request
    pub model: String,
    pub timeout_secs: u64,
    /// Extra attempts after a retryable failure
    pub max_retries: u32,
    /// Send the key as `api-key` instead of `Authorization: Bearer`
    pub azure_mode: bool,
    /// Client-side request budget
    #[cfg(feature = "rate-limit")]
    pub requests_per_second: u32,
}

impl OpenAIConfig {
    /// Ollama on localhost serving `all-minilm`.
    pub fn ollama() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            api_key: None,
            model: "all-minilm".into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            azure_mode: false,
            #[cfg(feature = "rate-limit")]
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
        }
    }

    /// Settings from `ECOLENS_OPENAI_BASE_URL`, `ECOLENS_OPENAI_API_KEY`,
    /// `ECOLENS_OPENAI_MODEL` and `ECOLENS_OPENAI_AZURE_MODE`, defaulting to
    /// OpenAI's `text-embedding-3-small`.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            base_url: var("ECOLENS_OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".into()),
            api_key: var("ECOLENS_OPENAI_API_KEY"),
            model: var("ECOLENS_OPENAI_MODEL").unwrap_or_else(|| "text-embedding-3-small".into()),
            azure_mode: var("ECOLENS_OPENAI_AZURE_MODE")
                .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
            ..Self::ollama()
        }
    }

    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn endpoint(&self) -> String {
        let root = self.base_url.trim_end_matches('/');
        let root = root.strip_suffix("/v1").unwrap_or(root);
        format!("{}/v1/embeddings", root)
    }
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    index: usize,
}

/// Embedding provider backed by an OpenAI-compatible HTTP endpoint.
///
/// The vector length is known up front for well-known models and otherwise
/// learned from the first response; any later response of a different
/// length is an error.
pub struct OpenAIProvider {
    client: Client,
    config: OpenAIConfig,
    endpoint: String,
    dimension: AtomicUsize,
    #[cfg(feature = "rate-limit")]
    limiter: DefaultDirectRateLimiter,
}

impl OpenAIProvider {
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SearchError::ProviderUnavailable(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            dimension: AtomicUsize::new(known_dimension(&config.model)),
            #[cfg(feature = "rate-limit")]
            limiter: RateLimiter::direct(Quota::per_second(
                NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN),
            )),
            config,
        })
    }

    /// Provider configured from `ECOLENS_OPENAI_*` variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request(&self, input: &[String]) -> RequestBuilder {
        let builder = self.client.post(&self.endpoint).json(&EmbeddingsRequest {
            model: &self.config.model,
            input,
        });

        match (&self.config.api_key, self.config.azure_mode) {
            (Some(key), true) => builder.header("api-key", key),
            (Some(key), false) => builder.bearer_auth(key),
            (None, _) => builder,
        }
    }

    async fn send(&self, input: &[String]) -> Result<Response> {
        #[cfg(feature = "rate-limit")]
        self.limiter.until_ready().await;

        let response = self.request(input).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            SearchError::ProviderUnavailable(reason)
        })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(status_error(response).await)
        }
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body: EmbeddingsResponse = self
            .send(texts)
            .await?
            .json()
            .await
            .map_err(|e| SearchError::Embedding(format!("malformed response: {}", e)))?;

        let mut items = body.data;
        if items.len() != texts.len() {
            return Err(SearchError::Embedding(format!(
                "asked for {} embeddings, received {}",
                texts.len(),
                items.len()
            )));
        }
        items.sort_by_key(|item| item.index);

        let vectors: Vec<Vec<f32>> = items.into_iter().map(|item| item.embedding).collect();
        self.check_dimension(&vectors)?;
        Ok(vectors)
    }

    /// All vectors share one length, equal to the one seen before (if any).
    fn check_dimension(&self, vectors: &[Vec<f32>]) -> Result<()> {
        let Some(len) = vectors.first().map(Vec::len) else {
            return Ok(());
        };
        if let Some(odd) = vectors.iter().find(|v| v.len() != len) {
            return Err(SearchError::DimensionMismatch {
                expected: len,
                actual: odd.len(),
            });
        }

        match self
            .dimension
            .compare_exchange(0, len, Ordering::Relaxed, Ordering::Relaxed)
        {
            Ok(_) => {
                debug!("{} produces {}-dimensional vectors", self.config.model, len);
                Ok(())
            }
            Err(known) if known == len => Ok(()),
            Err(known) => Err(SearchError::DimensionMismatch {
                expected: known,
                actual: len,
            }),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut backoff = FIRST_BACKOFF;
        let mut attempt = 0;
        loop {
            match self.embed_once(&texts).await {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "Embedding request failed, retry {}/{} in {:?}: {}",
                        attempt, self.config.max_retries, backoff, e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                outcome => return outcome,
            }
        }
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        let started = Instant::now();
        let probe = vec!["status probe".to_string()];

        let status = match self.send(&probe).await {
            // A throttled endpoint is still reachable
            Ok(_) | Err(SearchError::RateLimited { .. }) => {
                ProviderStatus::healthy(EmbeddingProviderType::Openai, "Remote")
                    .with_latency(started.elapsed().as_millis() as u64)
            }
            Err(e) => ProviderStatus::unavailable(EmbeddingProviderType::Openai, e.to_string()),
        };
        Ok(status.with_model(self.config.model.as_str()))
    }

    async fn warmup(&self) -> Result<()> {
        let status = self.check_status().await?;
        match status.error {
            Some(reason) if !status.available => Err(SearchError::ProviderUnavailable(reason)),
            _ => Ok(()),
        }
    }

    fn embedding_dim(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Openai
    }
}

impl std::fmt::Debug for OpenAIProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIProvider")
            .field("endpoint", &self.endpoint)
            .field("model", &self.config.model)
            .field("azure_mode", &self.config.azure_mode)
            .finish()
    }
}

/// Error for a non-success response.
async fn status_error(response: Response) -> SearchError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok());
    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SearchError::Unauthorized(body),
        StatusCode::NOT_FOUND => SearchError::ModelNotFound(body),
        StatusCode::TOO_MANY_REQUESTS => SearchError::RateLimited { retry_after },
        s if s.is_server_error() => {
            SearchError::ProviderUnavailable(format!("server answered {}", s))
        }
        s => SearchError::Embedding(format!("endpoint answered {}: {}", s, body)),
    }
}

/// Vector length of well-known models, 0 for anything else.
fn known_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-small" | "text-embedding-ada-002" => 1536,
        "text-embedding-3-large" => 3072,
        "nomic-embed-text" => 768,
        "all-minilm" | "all-minilm:l6-v2" => 384,
        _ => 0,
    }
}
