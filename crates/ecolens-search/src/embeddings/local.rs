//! In-process embeddings with Candle.
//!
//! The default model is `sentence-transformers/all-MiniLM-L6-v2` (384
//! dimensions). Sentence vectors are the attention-masked mean of the token
//! states, scaled to unit length, so cosine similarity reduces to a dot
//! product.
//!
//! Build with `--features metal` or `--features cuda` for GPU inference.

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::{api::sync::Api, Repo, RepoType};
use once_cell::sync::OnceCell;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::error::{Result, SearchError};

use super::provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};

/// HuggingFace repository of the default model
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Default repository revision
pub const DEFAULT_REVISION: &str = "main";

/// Vector length of the default model
pub const LOCAL_EMBEDDING_DIM: usize = 384;

const FORWARD_BATCH: usize = 32;
const MAX_TOKENS: usize = 256;
const DTYPE: DType = DType::F32;

/// Which model the local provider runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalConfig {
    /// HuggingFace repository id
    pub model_id: String,
    /// Branch, tag or commit
    pub revision: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            revision: DEFAULT_REVISION.to_string(),
        }
    }
}

impl LocalConfig {
    fn repo(&self) -> Repo {
        Repo::with_revision(
            self.model_id.clone(),
            RepoType::Model,
            self.revision.clone(),
        )
    }
}

/// Embedding provider running a BERT sentence encoder in process.
///
/// The model is fetched and loaded on first use; until then
/// [`embedding_dim`](EmbeddingProvider::embedding_dim) reports the default
/// model's size. Clones share the loaded model.
#[derive(Clone)]
pub struct LocalProvider {
    shared: Arc<Shared>,
}

struct Shared {
    config: LocalConfig,
    device: Device,
    encoder: OnceCell<BertEncoder>,
    dimension: AtomicUsize,
}

impl LocalProvider {
    /// Provider for the default model on the best available device.
    pub fn new() -> Result<Self> {
        Self::with_config(LocalConfig::default())
    }

    /// Provider for `config` on the best available device.
    pub fn with_config(config: LocalConfig) -> Result<Self> {
        Ok(Self::with_device(config, pick_device()))
    }

    /// Provider pinned to `device`.
    pub fn with_device(config: LocalConfig, device: Device) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                device,
                encoder: OnceCell::new(),
                dimension: AtomicUsize::new(LOCAL_EMBEDDING_DIM),
            }),
        }
    }

    /// Inference device.
    pub fn device(&self) -> &Device {
        &self.shared.device
    }

    /// Repository id of the model.
    pub fn model_id(&self) -> &str {
        &self.shared.config.model_id
    }

    /// Whether the model has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.shared.encoder.get().is_some()
    }

    fn device_label(&self) -> &'static str {
        match self.shared.device {
            Device::Cpu => "CPU",
            #[cfg(feature = "metal")]
            Device::Metal(_) => "Metal",
            #[cfg(feature = "cuda")]
            Device::Cuda(_) => "CUDA",
            #[allow(unreachable_patterns)]
            _ => "Unknown",
        }
    }

    fn encoder(&self) -> Result<&BertEncoder> {
        self.shared.encoder.get_or_try_init(|| {
            let encoder = BertEncoder::load(&self.shared.config, &self.shared.device)?;
            self.shared
                .dimension
                .store(encoder.hidden_size, Ordering::Relaxed);
            Ok(encoder)
        })
    }

    fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encoder = self.encoder()?;
        debug!("Embedding {} texts with {}", texts.len(), self.model_id());

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(FORWARD_BATCH) {
            vectors.extend(encoder.encode(chunk)?);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let provider = self.clone();
        tokio::task::spawn_blocking(move || provider.embed_blocking(&texts))
            .await
            .map_err(context("embedding task panicked"))?
    }

    async fn check_status(&self) -> Result<ProviderStatus> {
        let loaded = self.is_loaded();
        let reachable = if loaded {
            Ok(())
        } else {
            let config = self.shared.config.clone();
            tokio::task::spawn_blocking(move || probe_repository(&config))
                .await
                .map_err(context("status task panicked"))?
        };

        let status = match reachable {
            Ok(()) => ProviderStatus::healthy(EmbeddingProviderType::Local, self.device_label()),
            Err(reason) => ProviderStatus::unavailable(EmbeddingProviderType::Local, reason),
        };
        Ok(ProviderStatus {
            device: self.device_label().to_string(),
            model_ready: loaded,
            ..status.with_model(self.model_id())
        })
    }

    async fn warmup(&self) -> Result<()> {
        let provider = self.clone();
        let started = Instant::now();
        tokio::task::spawn_blocking(move || provider.encoder().map(drop))
            .await
            .map_err(context("warmup task panicked"))??;
        info!("Local embedding model ready in {:?}", started.elapsed());
        Ok(())
    }

    fn embedding_dim(&self) -> usize {
        self.shared.dimension.load(Ordering::Relaxed)
    }

    fn provider_type(&self) -> EmbeddingProviderType {
        EmbeddingProviderType::Local
    }
}

impl std::fmt::Debug for LocalProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalProvider")
            .field("model_id", &self.shared.config.model_id)
            .field("revision", &self.shared.config.revision)
            .field("device", &self.device_label())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

/// BERT weights with the tokenizer they were trained with.
struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
}

/// Files a sentence-transformers repository must provide.
struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl ModelFiles {
    fn fetch(config: &LocalConfig) -> Result<Self> {
        let api = Api::new().map_err(context("HuggingFace API unavailable"))?;
        let repo = api.repo(config.repo());
        let get = |name: &str| {
            repo.get(name)
                .map_err(|e| SearchError::Embedding(format!("cannot fetch {}: {}", name, e)))
        };

        Ok(Self {
            config: get("config.json")?,
            tokenizer: get("tokenizer.json")?,
            weights: get("model.safetensors")?,
        })
    }
}

impl BertEncoder {
    fn load(config: &LocalConfig, device: &Device) -> Result<Self> {
        info!("Loading embedding model {}", config.model_id);
        let files = ModelFiles::fetch(config)?;

        let raw = std::fs::read_to_string(&files.config).map_err(context("reading config.json"))?;
        let bert: BertConfig = serde_json::from_str(&raw).map_err(context("parsing config.json"))?;

        let mut tokenizer =
            Tokenizer::from_file(&files.tokenizer).map_err(context("loading tokenizer"))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(context("configuring truncation"))?;

        // SAFETY: the weights file lives in the HuggingFace cache and is not
        // written while mapped
        let weights = unsafe {
            VarBuilder::from_mmaped_safetensors(&[files.weights], DTYPE, device)
                .map_err(context("mapping weights"))?
        };
        let model = BertModel::load(weights, &bert).map_err(context("building model"))?;

        info!("Embedding model loaded, dim={}", bert.hidden_size);
        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
            hidden_size: bert.hidden_size,
        })
    }

    /// Unit-length sentence vectors for one forward pass.
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inputs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(context("tokenization"))?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            ids.push(Tensor::new(encoding.get_ids(), &self.device)?);
            masks.push(Tensor::new(encoding.get_attention_mask(), &self.device)?);
        }
        let ids = Tensor::stack(&ids, 0)?;
        let mask = Tensor::stack(&masks, 0)?;
        let segments = ids.zeros_like()?;

        let states = self
            .model
            .forward(&ids, &segments, Some(&mask))
            .map_err(context("forward pass"))?;

        // Masked mean over the sequence axis, then L2 normalization
        let weights = mask.to_dtype(DTYPE)?.unsqueeze(2)?;
        let pooled = states
            .broadcast_mul(&weights)?
            .sum(1)?
            .broadcast_div(&weights.sum(1)?)?;
        let unit = pooled.broadcast_div(&pooled.sqr()?.sum_keepdim(1)?.sqrt()?)?;

        Ok(unit.to_vec2::<f32>()?)
    }
}

/// Metal, then CUDA, then CPU, as compiled in.
fn pick_device() -> Device {
    #[cfg(feature = "metal")]
    match Device::new_metal(0) {
        Ok(device) => {
            info!("Embedding on Metal");
            return device;
        }
        Err(e) => debug!("Metal unavailable: {}", e),
    }

    #[cfg(feature = "cuda")]
    match Device::new_cuda(0) {
        Ok(device) => {
            info!("Embedding on CUDA");
            return device;
        }
        Err(e) => debug!("CUDA unavailable: {}", e),
    }

    debug!("Embedding on CPU");
    Device::Cpu
}

fn probe_repository(config: &LocalConfig) -> std::result::Result<(), String> {
    let api = Api::new().map_err(|e| format!("HuggingFace API unavailable: {}", e))?;
    api.repo(config.repo())
        .info()
        .map(drop)
        .map_err(|e| format!("model {} not downloadable: {}", config.model_id, e))
}

fn context<E: Display>(what: &'static str) -> impl FnOnce(E) -> SearchError {
    move |e| SearchError::Embedding(format!("{}: {}", what, e))
}
