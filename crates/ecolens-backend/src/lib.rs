//! Ecolens Backend - knowledge bases and the search engine
//!
//! This crate provides:
//! - The [`KnowledgeBase`] abstraction over where observations live
//! - Dataset loading, validation and legacy conversion
//! - Migration of a dataset into Qdrant
//! - The [`SearchEngine`] answering snippet queries
//!
//! ## Knowledge Base Types
//!
//! - [`InMemoryIndex`]: dataset file embedded at startup, filtered in process
//! - [`QdrantIndex`]: Qdrant collection, filtered and scored by the server
//!
//! ## Example
//!
//! ```ignore
//! use ecolens_backend::{DatasetSource, EngineOptions, InMemoryIndex, SearchEngine};
//! use ecolens_search::{create_provider, EmbeddingConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let embedder = create_provider(&EmbeddingConfig::local())?;
//!     let source = DatasetSource::canonical("data/efficiency-data.json");
//!     let index = InMemoryIndex::load(&source, embedder.as_ref()).await?;
//!
//!     let engine = SearchEngine::new(Arc::new(index), embedder, EngineOptions::default());
//!     for suggestion in engine.search("static String s;", "java", 5).await? {
//!         println!("[{}] {}", suggestion.component, suggestion.observation);
//!     }
//!     Ok(())
//! }
//! ```

pub mod dataset;
mod engine;
mod error;
mod local;
pub mod migrate;
mod remote;
mod traits;
mod types;

pub use dataset::{
    convert_legacy, load_dataset, write_dataset, DatasetRecord, DatasetSource, DatasetStats,
    LegacyRecord,
};
pub use engine::{to_embedding_config, EngineOptions, SearchEngine};
pub use error::{BackendError, ErrorKind};
pub use local::{InMemoryIndex, EMBED_BATCH_SIZE};
pub use migrate::{
    migrate_dataset, migrate_dataset_with_progress, MigrationOptions, MigrationStats,
    DEFAULT_MIGRATION_BATCH_SIZE,
};
pub use remote::{candidate_window, store_config, QdrantIndex};
pub use traits::KnowledgeBase;
pub use types::*;

pub use ecolens_search::{ProviderStatus, RankedObservation};

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BackendError>;
