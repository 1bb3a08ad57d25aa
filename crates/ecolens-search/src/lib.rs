//! Ecolens Search - retrieval primitives for energy-efficiency observations
//!
//! This crate provides the building blocks the Ecolens engine is assembled from:
//!
//! - **Tokenizer**: snippet → normalized word and operator tokens
//! - **Embeddings**: text → vector, locally via Candle or through an OpenAI-compatible API
//! - **Qdrant store**: observation collection management and language-filtered search
//! - **Ranker**: hybrid keyword/similarity inclusion, dedup, ordering and truncation
//!
//! # Example
//!
//! ```ignore
//! use ecolens_search::{rank, tokenize, Candidate, RankingOptions};
//!
//! let tokens = tokenize("static String s;");
//! let query = provider.embed_one("static String s;").await?;
//! let ranked = rank(&tokens, &query, candidates, 5, &RankingOptions::default());
//! ```

pub mod client;
pub mod embeddings;
pub mod error;
pub mod ranker;
pub mod schema;
pub mod tokenizer;

// Re-exports for convenience
pub use client::{CollectionSummary, QdrantConfig, QdrantStore};
pub use error::{Result, SearchError};
pub use ranker::{
    cosine_similarity, rank, Candidate, RankedObservation, RankingOptions,
    DEFAULT_SIMILARITY_THRESHOLD,
};
pub use schema::{
    normalize_language, ObservationEntry, ObservationHit, ObservationPoint, DEFAULT_COLLECTION,
};
pub use tokenizer::tokenize;

// Re-export provider abstraction types
pub use embeddings::{
    create_provider, validate_dimension, EmbeddingConfig, EmbeddingProvider,
    EmbeddingProviderType, LocalConfig, LocalProvider, OpenAIConfig, OpenAIProvider,
    ProviderStatus, LOCAL_EMBEDDING_DIM,
};
