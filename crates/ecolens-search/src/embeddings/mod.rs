//! Embedding generation for observations and snippets
//!
//! This module provides embedding generation with two provider backends:
//!
//! - **Local** - Candle-based inference with a sentence-transformers BERT model (CPU/Metal/CUDA)
//! - **OpenAI** - OpenAI-compatible APIs (OpenAI, Azure OpenAI, Ollama)
//!
//! # Architecture
//!
//! ```text
//! EmbeddingProvider (trait)
//!     ├── LocalProvider     - Candle + all-MiniLM-L6-v2
//!     └── OpenAIProvider    - HTTP client for /v1/embeddings API
//! ```
//!
//! One provider is built at startup via [`create_provider`] and shared as
//! `Arc<dyn EmbeddingProvider>`.
//!
//! # Example
//!
//! ```ignore
//! use ecolens_search::embeddings::{create_provider, EmbeddingConfig};
//!
//! let provider = create_provider(&EmbeddingConfig::local())?;
//! let vectors = provider.embed(vec!["Prefer StringBuilder in loops".into()]).await?;
//! ```

pub mod factory;
mod local;
pub mod openai;
mod provider;

// Re-export provider types
pub use provider::{EmbeddingProvider, EmbeddingProviderType, ProviderStatus};

// Re-export factory types and function
pub use factory::{create as create_provider, validate_dimension, EmbeddingConfig};

// Re-export LocalProvider
pub use local::{LocalConfig, LocalProvider, DEFAULT_MODEL_ID, LOCAL_EMBEDDING_DIM};

// Re-export OpenAIProvider
pub use openai::{OpenAIConfig, OpenAIProvider};
