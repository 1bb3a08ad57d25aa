//! Settings for the Ecolens search service.
//!
//! [`EcolensConfig`] is the typed form of `config.toml`. Every section has
//! defaults, so an empty file is a working in-memory setup. [`ConfigLoader`]
//! layers the user-wide file, the working-directory file and command-line
//! [`ConfigOverrides`], in that order.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default similarity threshold for the hybrid inclusion rule.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.2;

/// Default number of suggestions returned per search.
pub const DEFAULT_RESULT_LIMIT: usize = 10;

/// Default Qdrant collection holding the observations.
pub const DEFAULT_COLLECTION: &str = "efficiency_observations";

/// Default candidate window requested from the external index.
pub const DEFAULT_SEARCH_WINDOW: u64 = 1000;

/// Effective settings after all layers are applied.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EcolensConfig {
    /// `[backend]`: where observations come from
    pub backend: BackendConfig,

    /// `[embedding]`: how text becomes vectors
    pub embedding: EmbeddingConfig,

    /// `[ranking]`: inclusion threshold and result size
    pub ranking: RankingConfig,

    /// `[logging]`
    pub logging: LoggingConfig,
}

/// Knowledge base backend configuration.
///
/// # Example TOML
///
/// ```toml
/// [backend]
/// mode = "external"
///
/// [backend.qdrant]
/// url = "https://my-cluster.qdrant.io:6334"
/// api_key_env = "QDRANT_API_KEY"
/// collection = "efficiency_observations"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BackendConfig {
    /// Which backend serves candidates
    pub mode: BackendMode,

    /// Dataset settings (in-memory mode, and the source for migrations)
    pub dataset: DatasetConfig,

    /// Qdrant settings (external mode)
    pub qdrant: QdrantConfig,
}

/// Backend selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BackendMode {
    /// Dataset file loaded into memory at startup (default)
    #[default]
    InMemory,
    /// External Qdrant vector index
    External,
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory => write!(f, "in-memory"),
            Self::External => write!(f, "external"),
        }
    }
}

impl std::str::FromStr for BackendMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in-memory" | "inmemory" | "in_memory" | "memory" => Ok(Self::InMemory),
            "external" | "qdrant" => Ok(Self::External),
            _ => Err(ConfigError::Invalid(format!(
                "Unknown backend mode: '{}'. Valid values: in-memory, external",
                s
            ))),
        }
    }
}

/// Dataset location and schema version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Path to the JSON dataset (relative paths resolve against the config base dir)
    pub path: PathBuf,

    /// Schema version of the dataset file
    pub schema: DatasetSchema,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/efficiency-data.json"),
            schema: DatasetSchema::default(),
        }
    }
}

/// Dataset schema version.
///
/// The schema is always chosen explicitly; records are never sniffed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSchema {
    /// `language` / `component` / `keywords` (array) / `observation`
    #[default]
    Canonical,
    /// `lang` / `component` / `lang-keywords` (comma-separated) / `observation`
    Legacy,
}

impl std::fmt::Display for DatasetSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Canonical => write!(f, "canonical"),
            Self::Legacy => write!(f, "legacy"),
        }
    }
}

impl std::str::FromStr for DatasetSchema {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "canonical" | "v2" => Ok(Self::Canonical),
            "legacy" | "v1" => Ok(Self::Legacy),
            _ => Err(ConfigError::Invalid(format!(
                "Unknown dataset schema: '{}'. Valid values: canonical, legacy",
                s
            ))),
        }
    }
}

/// Connection to the external vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    /// gRPC endpoint
    pub url: String,

    /// API key for authentication (takes precedence over `api_key_env`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    pub api_key_env: Option<String>,

    /// Collection holding the observations
    pub collection: String,

    /// Per-request deadline, seconds
    pub timeout_secs: u64,

    /// Number of candidates requested per search, before hybrid ranking
    pub search_window: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            api_key: None,
            api_key_env: Some("QDRANT_API_KEY".to_string()),
            collection: DEFAULT_COLLECTION.to_string(),
            timeout_secs: 30,
            search_window: DEFAULT_SEARCH_WINDOW,
        }
    }
}

impl QdrantConfig {
    /// Resolve the API key from the explicit value or the configured environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| {
            self.api_key_env
                .as_ref()
                .and_then(|var| std::env::var(var).ok())
                .filter(|key| !key.is_empty())
        })
    }
}

/// Embedding provider selection.
///
/// A remote endpoint such as Ollama:
///
/// ```toml
/// [embedding]
/// provider = "openai"
///
/// [embedding.openai]
/// url = "http://localhost:11434/v1"
/// model = "nomic-embed-text"
/// api_key_env = ""
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderType,

    /// Used when `provider = "local"`
    pub local: LocalModelSettings,

    /// Must be present when `provider = "openai"`
    pub openai: Option<OpenAISettings>,
}

impl EmbeddingConfig {
    /// Check that the selected provider has what it needs to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: Vec<(&str, &str)> = match (self.provider, self.openai.as_ref()) {
            (EmbeddingProviderType::Local, _) => {
                vec![("embedding.local.model_id", self.local.model_id.as_str())]
            }
            (EmbeddingProviderType::Openai, None) => {
                return Err(ConfigError::Invalid(
                    "provider \"openai\" selected without an [embedding.openai] table".into(),
                ))
            }
            (EmbeddingProviderType::Openai, Some(remote)) => vec![
                ("embedding.openai.url", remote.url.as_str()),
                ("embedding.openai.model", remote.model.as_str()),
            ],
        };

        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((key, _)) => Err(ConfigError::invalid_value(*key, "must not be empty")),
            None => Ok(()),
        }
    }
}

/// Which embedding implementation serves requests.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingProviderType {
    /// In-process Candle model
    #[default]
    Local,
    /// Any `/v1/embeddings` endpoint: OpenAI, Azure, Ollama
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

impl std::str::FromStr for EmbeddingProviderType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("local") {
            Ok(Self::Local)
        } else if s.eq_ignore_ascii_case("openai") {
            Ok(Self::Openai)
        } else {
            Err(ConfigError::Invalid(format!(
                "Unknown embedding provider: '{}'. Valid values: local, openai",
                s
            )))
        }
    }
}

/// Local (Candle) model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalModelSettings {
    /// HuggingFace model repository
    pub model_id: String,

    /// Model revision
    pub revision: String,
}

impl Default for LocalModelSettings {
    fn default() -> Self {
        Self {
            model_id: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            revision: "main".to_string(),
        }
    }
}

/// Remote embedding endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAISettings {
    /// Base URL, `/embeddings` is appended
    pub url: String,

    /// Variable read for the key; empty or unset sends no credentials
    pub api_key_env: Option<String>,

    pub model: String,

    /// Per-request deadline, seconds
    pub timeout_secs: u64,

    /// Extra attempts after a timeout, 429 or 5xx
    pub max_retries: u32,

    /// Send the key as `api-key` instead of a bearer token
    pub azure_mode: bool,
}

impl Default for OpenAISettings {
    fn default() -> Self {
        Self {
            url: "https://api.openai.com/v1".to_string(),
            api_key_env: Some("OPENAI_API_KEY".to_string()),
            model: "text-embedding-3-small".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            azure_mode: false,
        }
    }
}

/// Ranking policy shared by both backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Minimum cosine similarity for inclusion without a keyword match.
    ///
    /// Tunable per deployment; the same value applies to every backend.
    pub similarity_threshold: f32,

    /// Result limit used when the caller does not give one
    pub default_limit: usize,

    /// Shape of each returned suggestion
    pub result_shape: ResultShape,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            default_limit: DEFAULT_RESULT_LIMIT,
            result_shape: ResultShape::default(),
        }
    }
}

/// Caller-facing projection of a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResultShape {
    /// `component` and `observation` only
    #[default]
    Compact,
    /// Adds `language`, `keywords`, `score` and `keyword_match`
    Full,
}

/// Diagnostics on stderr.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,

    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Values given on the command line; `None` leaves the file value alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub backend_mode: Option<BackendMode>,
    pub dataset_path: Option<PathBuf>,
    pub dataset_schema: Option<DatasetSchema>,
    pub qdrant_url: Option<String>,
    pub collection: Option<String>,
    pub similarity_threshold: Option<f32>,
    pub embedding_provider: Option<EmbeddingProviderType>,
    pub log_level: Option<String>,
}

fn set<T: Clone>(target: &mut T, value: &Option<T>) {
    if let Some(value) = value {
        *target = value.clone();
    }
}

impl EcolensConfig {
    /// Replace every setting the caller gave explicitly.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        set(&mut self.backend.mode, &overrides.backend_mode);
        set(&mut self.backend.dataset.path, &overrides.dataset_path);
        set(&mut self.backend.dataset.schema, &overrides.dataset_schema);
        set(&mut self.backend.qdrant.url, &overrides.qdrant_url);
        set(&mut self.backend.qdrant.collection, &overrides.collection);
        set(
            &mut self.ranking.similarity_threshold,
            &overrides.similarity_threshold,
        );
        set(&mut self.embedding.provider, &overrides.embedding_provider);
        set(&mut self.logging.level, &overrides.log_level);
    }

    /// Reject settings the engine cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.ranking.similarity_threshold;
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(ConfigError::invalid_value(
                "ranking.similarity_threshold",
                format!("{} is outside [-1.0, 1.0]", threshold),
            ));
        }

        let missing = match self.backend.mode {
            BackendMode::InMemory if self.backend.dataset.path.as_os_str().is_empty() => {
                Some("backend.dataset.path")
            }
            BackendMode::External if self.backend.qdrant.url.is_empty() => {
                Some("backend.qdrant.url")
            }
            BackendMode::External if self.backend.qdrant.collection.is_empty() => {
                Some("backend.qdrant.collection")
            }
            _ => None,
        };
        if let Some(key) = missing {
            return Err(ConfigError::Invalid(format!(
                "{} is required in {} mode",
                key, self.backend.mode
            )));
        }

        self.embedding.validate()
    }

    /// Resolve the dataset path against a base directory.
    pub fn dataset_path(&self, base_dir: &Path) -> PathBuf {
        if self.backend.dataset.path.is_absolute() {
            self.backend.dataset.path.clone()
        } else {
            base_dir.join(&self.backend.dataset.path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EcolensConfig::default();
        assert_eq!(config.backend.mode, BackendMode::InMemory);
        assert_eq!(config.backend.dataset.schema, DatasetSchema::Canonical);
        assert_eq!(config.backend.qdrant.url, "http://localhost:6334");
        assert_eq!(config.backend.qdrant.collection, "efficiency_observations");
        assert_eq!(config.backend.qdrant.search_window, 1000);
        assert_eq!(config.ranking.similarity_threshold, 0.2);
        assert_eq!(config.ranking.default_limit, 10);
        assert_eq!(config.ranking.result_shape, ResultShape::Compact);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = EcolensConfig::default();
        let overrides = ConfigOverrides {
            backend_mode: Some(BackendMode::External),
            qdrant_url: Some("http://remote:6334".to_string()),
            similarity_threshold: Some(0.1),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.backend.mode, BackendMode::External);
        assert_eq!(config.backend.qdrant.url, "http://remote:6334");
        assert_eq!(config.ranking.similarity_threshold, 0.1);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_backend_mode_from_str() {
        assert_eq!(
            "in-memory".parse::<BackendMode>().unwrap(),
            BackendMode::InMemory
        );
        assert_eq!(
            "memory".parse::<BackendMode>().unwrap(),
            BackendMode::InMemory
        );
        assert_eq!(
            "external".parse::<BackendMode>().unwrap(),
            BackendMode::External
        );
        assert_eq!(
            "Qdrant".parse::<BackendMode>().unwrap(),
            BackendMode::External
        );
        assert!("sqlite".parse::<BackendMode>().is_err());
    }

    #[test]
    fn test_backend_mode_display_roundtrip() {
        for mode in [BackendMode::InMemory, BackendMode::External] {
            assert_eq!(mode.to_string().parse::<BackendMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_dataset_schema_from_str() {
        assert_eq!(
            "legacy".parse::<DatasetSchema>().unwrap(),
            DatasetSchema::Legacy
        );
        assert_eq!(
            "v2".parse::<DatasetSchema>().unwrap(),
            DatasetSchema::Canonical
        );
        assert!("v3".parse::<DatasetSchema>().is_err());
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let mut config = EcolensConfig::default();
        config.ranking.similarity_threshold = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("similarity_threshold"));

        config.ranking.similarity_threshold = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_external_mode_requires_collection() {
        let mut config = EcolensConfig::default();
        config.backend.mode = BackendMode::External;
        config.backend.qdrant.collection = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("collection"));
    }

    #[test]
    fn test_dataset_path_resolution() {
        let config = EcolensConfig::default();
        let base = PathBuf::from("/srv/ecolens");
        assert_eq!(
            config.dataset_path(&base),
            PathBuf::from("/srv/ecolens/data/efficiency-data.json")
        );

        let mut config = EcolensConfig::default();
        config.backend.dataset.path = PathBuf::from("/opt/data.json");
        assert_eq!(config.dataset_path(&base), PathBuf::from("/opt/data.json"));
    }

    #[test]
    fn test_resolve_api_key_prefers_explicit_value() {
        let config = QdrantConfig {
            api_key: Some("inline".to_string()),
            api_key_env: Some("ECOLENS_TEST_UNSET_KEY_VAR".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key(), Some("inline".to_string()));

        let config = QdrantConfig {
            api_key: None,
            api_key_env: Some("ECOLENS_TEST_UNSET_KEY_VAR".to_string()),
            ..Default::default()
        };
        assert_eq!(config.resolve_api_key(), None);
    }

    #[test]
    fn test_embedding_config_validate_openai_missing() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            openai: None,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_embedding_config_validate_openai_valid() {
        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            openai: Some(OpenAISettings::default()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = EmbeddingConfig {
            provider: EmbeddingProviderType::Openai,
            openai: Some(OpenAISettings {
                model: " ".to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "embedding.openai.model"));
    }

    #[test]
    fn test_embedding_provider_type_from_str() {
        assert_eq!(
            "local".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::Local
        );
        assert_eq!(
            "OpenAI".parse::<EmbeddingProviderType>().unwrap(),
            EmbeddingProviderType::Openai
        );
        assert!("azure-ml".parse::<EmbeddingProviderType>().is_err());
    }

    #[test]
    fn test_config_toml_roundtrip() {
        let mut config = EcolensConfig::default();
        config.backend.mode = BackendMode::External;
        config.backend.dataset.schema = DatasetSchema::Legacy;
        config.ranking.result_shape = ResultShape::Full;
        config.logging.format = LogFormat::Json;

        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("mode = \"external\""));
        assert!(toml_str.contains("schema = \"legacy\""));

        let parsed: EcolensConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.backend.mode, BackendMode::External);
        assert_eq!(parsed.backend.dataset.schema, DatasetSchema::Legacy);
        assert_eq!(parsed.ranking.result_shape, ResultShape::Full);
        assert_eq!(parsed.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: EcolensConfig = toml::from_str(
            r#"
            [ranking]
            similarity_threshold = 0.1
            "#,
        )
        .unwrap();
        assert_eq!(parsed.ranking.similarity_threshold, 0.1);
        assert_eq!(parsed.ranking.default_limit, 10);
        assert_eq!(parsed.backend.mode, BackendMode::InMemory);
    }
}
