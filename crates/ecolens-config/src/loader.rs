//! Layered configuration files.
//!
//! Sources, lowest precedence first:
//! 1. `~/.ecolens/config.toml`
//! 2. `.ecolens/config.toml` under the working directory
//! 3. Command-line overrides
//!
//! Files are merged key by key as TOML tables before deserialization, so a
//! key present in a later file always wins, even when it restates a default.

use crate::error::ConfigError;
use crate::{ConfigOverrides, EcolensConfig};
use std::path::{Path, PathBuf};
use toml::{Table, Value};
use tracing::{debug, trace};

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".ecolens";

/// Locates and merges configuration files.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Directory holding the user-wide file, `None` without a home directory
    global_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader rooted at `~/.ecolens`.
    pub fn new() -> Self {
        Self {
            global_dir: dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME)),
        }
    }

    /// Loader with the user-wide directory somewhere else.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_dir: Some(global_dir.into()),
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_dir.as_ref().map(|dir| dir.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, root: &Path) -> PathBuf {
        root.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)
    }

    /// Effective configuration for `root`: global file, then local file, then overrides.
    ///
    /// Missing files are skipped. A file that exists but cannot be read or
    /// parsed is an error naming that file.
    pub fn load(
        &self,
        root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<EcolensConfig, ConfigError> {
        let mut merged = Table::new();

        let candidates = self
            .global_config_path()
            .into_iter()
            .chain(std::iter::once(self.local_config_path(root)));
        for path in candidates {
            if !path.exists() {
                trace!("No config at {:?}", path);
                continue;
            }
            debug!("Merging config from {:?}", path);
            merge_tables(&mut merged, read_layer(&path)?);
        }

        let mut config: EcolensConfig = Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Invalid(e.to_string()))?;
        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }
        Ok(config)
    }

    /// Configuration from `path` alone; global and local files are ignored.
    pub fn load_file(
        &self,
        path: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<EcolensConfig, ConfigError> {
        debug!("Loading config from {:?}", path);
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let mut config: EcolensConfig =
            toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
        if let Some(overrides) = overrides {
            config.apply_overrides(overrides);
        }
        Ok(config)
    }

    /// Write a default `~/.ecolens/config.toml` unless one exists.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let dir = self.global_dir.as_deref().ok_or(ConfigError::NoHomeDir)?;
        write_default(dir)
    }

    /// Write a default `.ecolens/config.toml` under `root` unless one exists.
    pub fn init_local(&self, root: &Path) -> Result<PathBuf, ConfigError> {
        write_default(&root.join(CONFIG_DIR_NAME))
    }
}

/// Read one file as a raw table after checking it against the typed schema,
/// so type errors are reported against the file that holds them.
fn read_layer(path: &Path) -> Result<Table, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    toml::from_str::<EcolensConfig>(&content).map_err(|e| ConfigError::parse_toml(path, e))?;
    toml::from_str(&content).map_err(|e| ConfigError::parse_toml(path, e))
}

/// Recursively copy `layer` into `base`; nested tables merge, anything else replaces.
fn merge_tables(base: &mut Table, layer: Table) {
    for (key, value) in layer {
        match value {
            Value::Table(nested) => match base.get_mut(&key) {
                Some(Value::Table(existing)) => merge_tables(existing, nested),
                _ => {
                    base.insert(key, Value::Table(nested));
                }
            },
            other => {
                base.insert(key, other);
            }
        }
    }
}

fn write_default(dir: &Path) -> Result<PathBuf, ConfigError> {
    std::fs::create_dir_all(dir).map_err(|e| ConfigError::create_dir(dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        debug!("Keeping existing config at {:?}", path);
        return Ok(path);
    }

    let content = toml::to_string_pretty(&EcolensConfig::default())?;
    std::fs::write(&path, content).map_err(|e| ConfigError::write_file(&path, e))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackendMode, DatasetSchema, ResultShape};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    /// Workspace with an isolated global directory.
    fn workspace() -> (TempDir, ConfigLoader) {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::with_global_dir(temp.path().join("home"));
        (temp, loader)
    }

    // ============================================================
    // Layering
    // ============================================================

    #[test]
    fn test_no_files_gives_defaults() {
        let (temp, loader) = workspace();
        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.backend.mode, BackendMode::InMemory);
        assert_eq!(config.ranking.similarity_threshold, 0.2);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_local_file_only() {
        let (temp, loader) = workspace();
        write(
            &loader.local_config_path(temp.path()),
            r#"
            [backend]
            mode = "external"

            [backend.qdrant]
            collection = "advice"
            "#,
        );

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.backend.mode, BackendMode::External);
        assert_eq!(config.backend.qdrant.collection, "advice");
        assert_eq!(config.backend.qdrant.url, "http://localhost:6334");
    }

    #[test]
    fn test_sibling_keys_survive_merge() {
        let (temp, loader) = workspace();
        write(
            &loader.global_config_path().unwrap(),
            r#"
            [ranking]
            similarity_threshold = 0.1
            default_limit = 5
            "#,
        );
        write(
            &loader.local_config_path(temp.path()),
            r#"
            [ranking]
            result_shape = "full"
            "#,
        );

        let config = loader.load(temp.path(), None).unwrap();

        assert_eq!(config.ranking.result_shape, ResultShape::Full);
        assert_eq!(config.ranking.similarity_threshold, 0.1);
        assert_eq!(config.ranking.default_limit, 5);
    }

    #[test]
    fn test_local_can_restore_a_default() {
        let (temp, loader) = workspace();
        write(
            &loader.global_config_path().unwrap(),
            "[logging]\nlevel = \"debug\"\n",
        );
        write(
            &loader.local_config_path(temp.path()),
            "[logging]\nlevel = \"info\"\n",
        );

        let config = loader.load(temp.path(), None).unwrap();
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_overrides_beat_files() {
        let (temp, loader) = workspace();
        write(
            &loader.local_config_path(temp.path()),
            "[backend.qdrant]\nurl = \"http://local:6334\"\n",
        );
        let overrides = ConfigOverrides {
            qdrant_url: Some("http://cli:6334".to_string()),
            dataset_schema: Some(DatasetSchema::Legacy),
            ..Default::default()
        };

        let config = loader.load(temp.path(), Some(&overrides)).unwrap();

        assert_eq!(config.backend.qdrant.url, "http://cli:6334");
        assert_eq!(config.backend.dataset.schema, DatasetSchema::Legacy);
    }

    #[test]
    fn test_explicit_file_skips_layers() {
        let (temp, loader) = workspace();
        write(
            &loader.local_config_path(temp.path()),
            "[logging]\nlevel = \"trace\"\n",
        );
        let explicit = temp.path().join("ecolens.toml");
        write(
            &explicit,
            r#"
            [backend.dataset]
            path = "/data/observations.json"
            schema = "legacy"
            "#,
        );

        let config = loader.load_file(&explicit, None).unwrap();

        assert_eq!(
            config.backend.dataset.path,
            PathBuf::from("/data/observations.json")
        );
        assert_eq!(config.backend.dataset.schema, DatasetSchema::Legacy);
        assert_eq!(config.logging.level, "info");
    }

    // ============================================================
    // Errors
    // ============================================================

    #[test]
    fn test_syntax_error_names_file() {
        let (temp, loader) = workspace();
        let path = loader.local_config_path(temp.path());
        write(&path, "[ranking\nbroken");

        let err = loader.load(temp.path(), None).unwrap_err();

        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    fn test_type_error_names_the_offending_layer() {
        let (temp, loader) = workspace();
        let global = loader.global_config_path().unwrap();
        write(&global, "[ranking]\nsimilarity_threshold = \"high\"\n");
        write(
            &loader.local_config_path(temp.path()),
            "[logging]\nlevel = \"warn\"\n",
        );

        let err = loader.load(temp.path(), None).unwrap_err();
        assert!(err.to_string().contains(&global.display().to_string()));
    }

    #[test]
    fn test_missing_explicit_file() {
        let (temp, loader) = workspace();
        let err = loader
            .load_file(&temp.path().join("absent.toml"), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    // ============================================================
    // Init
    // ============================================================

    #[test]
    fn test_init_local_writes_loadable_defaults() {
        let (temp, loader) = workspace();

        let path = loader.init_local(temp.path()).unwrap();

        assert!(path.ends_with(".ecolens/config.toml"));
        let config = loader.load(temp.path(), None).unwrap();
        assert_eq!(config.ranking.default_limit, 10);
    }

    #[test]
    fn test_init_keeps_existing_file() {
        let (temp, loader) = workspace();
        let global = loader.global_config_path().unwrap();
        write(&global, "[logging]\nlevel = \"error\"\n");

        let path = loader.init_global().unwrap();

        assert_eq!(path, global);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "[logging]\nlevel = \"error\"\n"
        );
    }

    #[test]
    fn test_init_global_without_home() {
        let loader = ConfigLoader { global_dir: None };
        assert!(loader.global_config_path().is_none());
        assert!(matches!(loader.init_global(), Err(ConfigError::NoHomeDir)));
    }
}
