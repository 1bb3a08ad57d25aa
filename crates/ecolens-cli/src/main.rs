//! Ecolens CLI - energy-efficiency suggestions for code snippets
//!
//! # Usage
//!
//! ```bash
//! # Suggestions for a snippet
//! ecolens search "static String s;" --language java
//!
//! # Read the snippet from a file or stdin
//! ecolens search --file Loop.java --language java --full
//! cat loop.py | ecolens search --language python
//!
//! # Load the dataset into Qdrant and search it there
//! ecolens migrate --recreate
//! ecolens --backend external search "x % y" -l java
//!
//! # Dataset maintenance
//! ecolens dataset validate data/efficiency-data.json
//! ecolens dataset convert old.json new.json
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ecolens_config::{
    BackendMode, ConfigError, ConfigOverrides, DatasetSchema, EmbeddingProviderType, LogFormat,
    LoggingConfig,
};
use tracing_subscriber::EnvFilter;

mod commands;
mod progress;

/// Ecolens - energy-efficiency advice for source-code snippets
#[derive(Parser, Debug)]
#[command(name = "ecolens")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Path to configuration file (skips global and local lookup)
    #[arg(long, short = 'c', global = true, env = "ECOLENS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Knowledge base backend (in-memory, external)
    #[arg(long, global = true, env = "ECOLENS_BACKEND", value_parser = parse_backend_mode)]
    backend: Option<BackendMode>,

    /// Qdrant server URL
    #[arg(long, global = true, env = "ECOLENS_QDRANT_URL")]
    qdrant_url: Option<String>,

    /// Qdrant collection
    #[arg(long, global = true, env = "ECOLENS_COLLECTION")]
    collection: Option<String>,

    /// Dataset file for the in-memory backend
    #[arg(long, global = true, env = "ECOLENS_DATASET")]
    dataset: Option<PathBuf>,

    /// Dataset schema (canonical, legacy)
    #[arg(long, global = true, env = "ECOLENS_DATASET_SCHEMA", value_parser = parse_dataset_schema)]
    dataset_schema: Option<DatasetSchema>,

    /// Minimum similarity for inclusion without a keyword match
    #[arg(long, global = true, env = "ECOLENS_THRESHOLD", allow_negative_numbers = true)]
    threshold: Option<f32>,

    /// Embedding provider type (local, openai)
    #[arg(long, global = true, env = "ECOLENS_EMBEDDING_PROVIDER", value_parser = parse_embedding_provider)]
    embedding_provider: Option<EmbeddingProviderType>,
}

fn parse_backend_mode(s: &str) -> Result<BackendMode, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

fn parse_dataset_schema(s: &str) -> Result<DatasetSchema, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

fn parse_embedding_provider(s: &str) -> Result<EmbeddingProviderType, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            backend_mode: self.backend,
            dataset_path: self.dataset.clone(),
            dataset_schema: self.dataset_schema,
            qdrant_url: self.qdrant_url.clone(),
            collection: self.collection.clone(),
            similarity_threshold: self.threshold,
            embedding_provider: self.embedding_provider,
            log_level: None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Suggest energy-efficiency improvements for a code snippet
    Search(commands::search::SearchArgs),

    /// Embed the dataset and load it into a Qdrant collection
    Migrate(commands::migrate::MigrateArgs),

    /// Validate and convert dataset files
    #[command(subcommand)]
    Dataset(commands::dataset::DatasetCommand),

    /// View and initialize configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show backend and embedding provider status
    Status(commands::status::StatusArgs),
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins; otherwise `--quiet`/`--verbose`, then `logging.level`.
fn init_tracing(global: &GlobalOptions, logging: &LoggingConfig) -> Result<()> {
    let level = if global.quiet {
        "error"
    } else if global.verbose {
        "debug"
    } else {
        logging.level.as_str()
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match logging.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.with_ansi(true).try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config file is reported by the command itself
    let logging = commands::load_config(&cli.global)
        .map(|loaded| loaded.config.logging)
        .unwrap_or_default();
    init_tracing(&cli.global, &logging)?;

    match cli.command {
        Commands::Search(args) => commands::search::execute(args, cli.global).await,
        Commands::Migrate(args) => commands::migrate::execute(args, cli.global).await,
        Commands::Dataset(cmd) => commands::dataset::execute(cmd, cli.global).await,
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global).await,
        Commands::Status(args) => commands::status::execute(args, cli.global).await,
    }
}
