//! CLI command implementations

pub mod config;
pub mod dataset;
pub mod migrate;
pub mod search;
pub mod status;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ecolens_backend::SearchEngine;
use ecolens_config::{ConfigLoader, EcolensConfig, ResultShape};
use tracing::debug;

use crate::progress::Feedback;
use crate::GlobalOptions;

/// Merged configuration and the directory relative paths resolve against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Effective configuration, CLI overrides applied
    pub config: EcolensConfig,

    /// Base for relative dataset paths
    pub base_dir: PathBuf,
}

/// Load configuration with optional config file override.
///
/// With `--config`, only that file is read and relative paths resolve
/// against its directory. Otherwise global and local files are merged and
/// relative paths resolve against the working directory.
pub fn load_config(global: &GlobalOptions) -> Result<LoadedConfig> {
    let overrides = global.to_config_overrides();
    let loader = ConfigLoader::new();

    if let Some(ref config_path) = global.config {
        let config = loader
            .load_file(config_path, Some(&overrides))
            .context("Failed to load config file")?;
        let base_dir = match config_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => working_dir()?,
        };
        debug!("Config from {:?}, paths relative to {:?}", config_path, base_dir);
        return Ok(LoadedConfig { config, base_dir });
    }

    let base_dir = working_dir()?;
    let config = loader
        .load(&base_dir, Some(&overrides))
        .context("Failed to load configuration")?;
    debug!("Effective backend: {}", config.backend.mode);
    Ok(LoadedConfig { config, base_dir })
}

/// Current working directory.
pub fn working_dir() -> Result<PathBuf> {
    std::env::current_dir().context("Failed to get current directory")
}

/// Build the search engine selected by configuration.
pub async fn create_engine(
    global: &GlobalOptions,
    shape: Option<ResultShape>,
) -> Result<SearchEngine> {
    let LoadedConfig {
        mut config,
        base_dir,
    } = load_config(global)?;

    if let Some(shape) = shape {
        config.ranking.result_shape = shape;
    }

    let feedback = Feedback::spinner(
        &format!("Loading {} knowledge base...", config.backend.mode),
        global.quiet,
    );
    match SearchEngine::from_config(&config, &base_dir).await {
        Ok(engine) => {
            feedback.succeed(&format!("Knowledge base ready ({})", config.backend.mode));
            Ok(engine)
        }
        Err(e) => {
            feedback.fail("Knowledge base unavailable");
            Err(e).context("Failed to create search engine")
        }
    }
}

/// Resolve a path given on the command line against the working directory.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(working_dir()?.join(path))
    }
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}
