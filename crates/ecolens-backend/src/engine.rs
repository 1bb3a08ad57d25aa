//! Search engine: validation, tokenizing, embedding, candidate retrieval and
//! hybrid ranking for one snippet.
//!
//! # Example
//!
//! ```ignore
//! use ecolens_backend::SearchEngine;
//!
//! let engine = SearchEngine::from_config(&config, Path::new(".")).await?;
//! let suggestions = engine.search("static String s;", "java", 5).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use ecolens_config::{BackendMode, EcolensConfig, RankingConfig, ResultShape};
use ecolens_search::{
    create_provider, normalize_language, rank, tokenize, validate_dimension, EmbeddingConfig,
    EmbeddingProvider, LocalConfig, OpenAIConfig, RankedObservation, RankingOptions, SearchError,
    DEFAULT_SIMILARITY_THRESHOLD,
};
use tracing::{debug, info};

use crate::dataset::DatasetSource;
use crate::error::BackendError;
use crate::local::InMemoryIndex;
use crate::remote::QdrantIndex;
use crate::traits::KnowledgeBase;
use crate::types::{CandidateQuery, SearchRequest, Suggestion};
use crate::Result;

/// Ranking policy and output settings of an engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineOptions {
    /// Inclusion threshold
    pub ranking: RankingOptions,

    /// Projection applied to each result
    pub result_shape: ResultShape,

    /// Limit used when a request does not carry one
    pub default_limit: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            ranking: RankingOptions::with_threshold(DEFAULT_SIMILARITY_THRESHOLD),
            result_shape: ResultShape::Compact,
            default_limit: ecolens_config::DEFAULT_RESULT_LIMIT,
        }
    }
}

impl EngineOptions {
    /// Options from the `[ranking]` configuration section.
    pub fn from_config(config: &RankingConfig) -> Self {
        Self {
            ranking: RankingOptions::with_threshold(config.similarity_threshold),
            result_shape: config.result_shape,
            default_limit: config.default_limit,
        }
    }

    /// Set the similarity threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.ranking = RankingOptions::with_threshold(threshold);
        self
    }

    /// Set the result shape.
    pub fn with_result_shape(mut self, shape: ResultShape) -> Self {
        self.result_shape = shape;
        self
    }
}

/// Retrieves energy-efficiency suggestions for code snippets.
///
/// The knowledge base is fixed at construction. The engine holds no
/// per-request state and is shared across concurrent requests via `Arc`.
pub struct SearchEngine {
    backend: Arc<dyn KnowledgeBase>,
    embedder: Arc<dyn EmbeddingProvider>,
    options: EngineOptions,
}

impl SearchEngine {
    /// Create an engine over a knowledge base and embedding provider.
    pub fn new(
        backend: Arc<dyn KnowledgeBase>,
        embedder: Arc<dyn EmbeddingProvider>,
        options: EngineOptions,
    ) -> Self {
        Self {
            backend,
            embedder,
            options,
        }
    }

    /// Build the provider and knowledge base selected by `config`.
    ///
    /// Relative dataset paths resolve against `base_dir`.
    pub async fn from_config(config: &EcolensConfig, base_dir: &Path) -> Result<Self> {
        config.validate()?;

        let embedder = create_provider(&to_embedding_config(&config.embedding))?;
        info!(
            "Using {} embedding provider for the {} backend",
            embedder.provider_type(),
            config.backend.mode
        );

        let backend: Arc<dyn KnowledgeBase> = match config.backend.mode {
            BackendMode::InMemory => {
                let source = DatasetSource::from_config(config, base_dir);
                Arc::new(InMemoryIndex::load(&source, embedder.as_ref()).await?)
            }
            BackendMode::External => {
                let index = QdrantIndex::connect(&config.backend.qdrant).await?;
                if let Some(size) = index.vector_size() {
                    validate_dimension(embedder.as_ref(), size as usize).map_err(|e| match e {
                        SearchError::DimensionMismatch { expected, actual } => {
                            BackendError::DimensionMismatch { expected, actual }
                        }
                        other => other.into(),
                    })?;
                }
                Arc::new(index)
            }
        };

        Ok(Self::new(
            backend,
            embedder,
            EngineOptions::from_config(&config.ranking),
        ))
    }

    /// The knowledge base serving this engine.
    pub fn backend(&self) -> &Arc<dyn KnowledgeBase> {
        &self.backend
    }

    /// The embedding provider.
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Ranking and output settings.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Suggestions for a snippet, at most `limit`, in the configured shape.
    ///
    /// # Errors
    /// * Validation - snippet or language blank
    /// * Backend - embedding or knowledge base failure
    pub async fn search(
        &self,
        snippet: &str,
        language: &str,
        limit: usize,
    ) -> Result<Vec<Suggestion>> {
        let ranked = self.search_ranked(snippet, language, limit).await?;
        Ok(ranked
            .iter()
            .map(|r| Suggestion::project(r, self.options.result_shape))
            .collect())
    }

    /// Search for a request carrying a signed, optional limit.
    pub async fn search_request(&self, request: &SearchRequest) -> Result<Vec<Suggestion>> {
        let limit = request.limit_or(self.options.default_limit)?;
        self.search(&request.snippet, &request.language, limit)
            .await
    }

    /// Ranked observations before projection.
    pub async fn search_ranked(
        &self,
        snippet: &str,
        language: &str,
        limit: usize,
    ) -> Result<Vec<RankedObservation>> {
        if snippet.trim().is_empty() {
            return Err(BackendError::validation(
                "snippet must be a non-empty string",
            ));
        }

        let language = normalize_language(language);
        if language.is_empty() {
            return Err(BackendError::validation(
                "language must be a non-empty string",
            ));
        }

        if limit == 0 {
            return Ok(Vec::new());
        }

        let tokens = tokenize(snippet);
        let embedding = self.embedder.embed_one(snippet).await?;
        let query = CandidateQuery::new(language, embedding, limit);

        let candidates = self.backend.candidates(&query).await?;
        let candidate_count = candidates.len();

        let ranked = rank(
            &tokens,
            &query.embedding,
            candidates,
            limit,
            &self.options.ranking,
        );

        debug!(
            "Search '{}': {} tokens, {} candidates, {} results",
            query.language,
            tokens.len(),
            candidate_count,
            ranked.len()
        );
        Ok(ranked)
    }
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("backend", &self.backend.kind())
            .field("provider", &self.embedder.provider_type())
            .field("options", &self.options)
            .finish()
    }
}

/// Convert the configured embedding settings to the provider factory's config.
pub fn to_embedding_config(settings: &ecolens_config::EmbeddingConfig) -> EmbeddingConfig {
    use ecolens_config::EmbeddingProviderType;

    match settings.provider {
        EmbeddingProviderType::Local => EmbeddingConfig::local_with_config(LocalConfig {
            model_id: settings.local.model_id.clone(),
            revision: settings.local.revision.clone(),
        }),
        EmbeddingProviderType::Openai => {
            if let Some(ref openai) = settings.openai {
                // Resolve API key from env var if specified
                let api_key = openai
                    .api_key_env
                    .as_ref()
                    .and_then(|env_var| std::env::var(env_var).ok())
                    .filter(|key| !key.is_empty());

                let config = OpenAIConfig {
                    base_url: openai.url.clone(),
                    api_key,
                    model: openai.model.clone(),
                    azure_mode: openai.azure_mode,
                    ..OpenAIConfig::ollama()
                }
                .with_timeout(openai.timeout_secs)
                .with_max_retries(openai.max_retries);
                EmbeddingConfig::openai_with_config(config)
            } else {
                // No settings provided, let factory read from environment
                EmbeddingConfig::openai()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BackendKind, Candidate, KnowledgeBaseStatus};
    use async_trait::async_trait;
    use ecolens_search::{EmbeddingProviderType, ObservationEntry, ProviderStatus};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct UnitProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for UnitProvider {
        async fn embed(&self, texts: Vec<String>) -> ecolens_search::Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        async fn check_status(&self) -> ecolens_search::Result<ProviderStatus> {
            Ok(ProviderStatus::healthy(EmbeddingProviderType::Local, "CPU"))
        }

        async fn warmup(&self) -> ecolens_search::Result<()> {
            Ok(())
        }

        fn embedding_dim(&self) -> usize {
            2
        }

        fn provider_type(&self) -> EmbeddingProviderType {
            EmbeddingProviderType::Local
        }
    }

    /// Returns fixed, pre-scored candidates and records the last query.
    struct FixedBase {
        candidates: Vec<Candidate>,
        last_language: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl KnowledgeBase for FixedBase {
        async fn candidates(&self, query: &CandidateQuery) -> Result<Vec<Candidate>> {
            *self.last_language.lock().unwrap() = Some(query.language.clone());
            Ok(self.candidates.clone())
        }

        fn kind(&self) -> BackendKind {
            BackendKind::External
        }

        async fn status(&self) -> Result<KnowledgeBaseStatus> {
            Ok(KnowledgeBaseStatus {
                kind: BackendKind::External,
                location: "memory".to_string(),
                collection: None,
                entries: Some(self.candidates.len() as u64),
                dimension: Some(2),
                languages: Vec::new(),
            })
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }
    }

    fn candidate(component: &str, observation: &str, score: f32) -> Candidate {
        Candidate::scored(
            Arc::new(ObservationEntry::new(
                "java",
                component,
                Vec::<String>::new(),
                observation,
            )),
            score,
        )
    }

    fn engine(options: EngineOptions) -> (SearchEngine, Arc<UnitProvider>, Arc<FixedBase>) {
        let provider = Arc::new(UnitProvider {
            calls: AtomicUsize::new(0),
        });
        let base = Arc::new(FixedBase {
            candidates: vec![
                candidate("Low", "barely related", 0.1),
                candidate("High", "closely related", 0.9),
                candidate("Mid", "somewhat related", 0.5),
            ],
            last_language: std::sync::Mutex::new(None),
        });
        let engine = SearchEngine::new(base.clone(), provider.clone(), options);
        (engine, provider, base)
    }

    #[test]
    fn test_engine_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SearchEngine>();
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let (engine, provider, _) = engine(EngineOptions::default());

        for (snippet, language) in [("", "java"), (" \n\t", "java"), ("x % y", "  ")] {
            let err = engine.search(snippet, language, 5).await.unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::Validation);
        }
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_limit_skips_work() {
        let (engine, provider, _) = engine(EngineOptions::default());
        assert!(engine.search("x % y", "java", 0).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ranks_and_projects_compact() {
        let (engine, _, base) = engine(EngineOptions::default());

        let results = engine.search("int x;", " Java ", 5).await.unwrap();
        let components: Vec<&str> = results.iter().map(|s| s.component.as_str()).collect();
        assert_eq!(components, vec!["High", "Mid"]);
        assert!(results.iter().all(|s| s.score.is_none()));
        assert_eq!(
            base.last_language.lock().unwrap().as_deref(),
            Some("java")
        );
    }

    #[tokio::test]
    async fn test_full_shape_and_threshold() {
        let options = EngineOptions::default()
            .with_threshold(0.05)
            .with_result_shape(ResultShape::Full);
        let (engine, _, _) = engine(options);

        let results = engine.search("int x;", "java", 5).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].score, Some(0.9));
        assert_eq!(results[0].language.as_deref(), Some("java"));
        assert_eq!(results[2].keyword_match, Some(false));
    }

    #[tokio::test]
    async fn test_search_request_limits() {
        let (engine, _, _) = engine(EngineOptions {
            default_limit: 1,
            ..EngineOptions::default()
        });

        let err = engine
            .search_request(&SearchRequest::new("int x;", "java", -1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(err.to_string().contains("-1"));

        let request = SearchRequest {
            snippet: "int x;".to_string(),
            language: "java".to_string(),
            limit: None,
        };
        assert_eq!(engine.search_request(&request).await.unwrap().len(), 1);

        let results = engine
            .search_request(&SearchRequest::new("int x;", "java", 2))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_options_from_config() {
        let config = RankingConfig {
            similarity_threshold: 0.35,
            default_limit: 7,
            result_shape: ResultShape::Full,
        };
        let options = EngineOptions::from_config(&config);
        assert_eq!(options.ranking.similarity_threshold, 0.35);
        assert_eq!(options.default_limit, 7);
        assert_eq!(options.result_shape, ResultShape::Full);
    }

    #[test]
    fn test_to_embedding_config() {
        let settings = ecolens_config::EmbeddingConfig::default();
        let config = to_embedding_config(&settings);
        assert_eq!(config.provider, ecolens_search::EmbeddingProviderType::Local);
        assert_eq!(
            config.local.model_id,
            "sentence-transformers/all-MiniLM-L6-v2"
        );

        let settings = ecolens_config::EmbeddingConfig {
            provider: ecolens_config::EmbeddingProviderType::Openai,
            openai: Some(ecolens_config::OpenAISettings {
                url: "http://localhost:11434/v1".to_string(),
                api_key_env: None,
                model: "nomic-embed-text".to_string(),
                timeout_secs: 12,
                max_retries: 1,
                azure_mode: false,
            }),
            ..Default::default()
        };
        let config = to_embedding_config(&settings);
        let openai = config.openai.unwrap();
        assert_eq!(openai.base_url, "http://localhost:11434/v1");
        assert_eq!(openai.model, "nomic-embed-text");
        assert!(openai.api_key.is_none());
        assert_eq!(openai.timeout_secs, 12);
        assert_eq!(openai.max_retries, 1);
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_config() {
        let mut config = EcolensConfig::default();
        config.ranking.similarity_threshold = 2.0;

        let err = SearchEngine::from_config(&config, Path::new("."))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Config);
    }
}
