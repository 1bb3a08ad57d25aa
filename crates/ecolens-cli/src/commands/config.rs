//! `ecolens config`: inspect the merged settings and create config files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use ecolens_config::{ConfigLoader, EcolensConfig};
use serde::Serialize;

use super::{load_config, print_info, working_dir};
use crate::GlobalOptions;

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged configuration as TOML
    Show(ShowArgs),

    /// Print one setting by dotted key, e.g. `ranking.default_limit`
    Get(GetArgs),

    /// List the files that are consulted
    Path(PathArgs),

    /// Write a config file holding the defaults
    Init(InitArgs),
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Print JSON instead of TOML
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct GetArgs {
    key: String,

    /// Print the value as JSON even when it is a plain string
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct PathArgs {
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Target ~/.ecolens rather than ./.ecolens
    #[arg(long)]
    global: bool,
}

/// Where configuration is looked up, for `config path --json`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    pub global: Option<PathBuf>,
    pub global_exists: bool,
    pub local: PathBuf,
    pub local_exists: bool,
    /// `--config`, which replaces both files
    pub explicit: Option<PathBuf>,
}

pub async fn execute(cmd: ConfigCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, global),
        ConfigCommand::Get(args) => execute_get(args, global),
        ConfigCommand::Path(args) => execute_path(args, global),
        ConfigCommand::Init(args) => execute_init(args, global),
    }
}

fn execute_show(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?.config;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        let toml = toml::to_string_pretty(&config).context("Failed to render configuration")?;
        print!("{}", toml);
    }

    Ok(())
}

fn execute_get(args: GetArgs, global: GlobalOptions) -> Result<()> {
    let config = load_config(&global)?.config;
    let value = get_config_value(&config, &args.key)
        .with_context(|| format!("Unknown configuration key: {}", args.key))?;

    match value {
        serde_json::Value::String(text) if !args.json => println!("{}", text),
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
            println!("{}", serde_json::to_string_pretty(&value)?)
        }
        scalar => println!("{}", scalar),
    }
    Ok(())
}

fn execute_path(args: PathArgs, global: GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let global_path = loader.global_config_path();
    let local = loader.local_config_path(&working_dir()?);
    let paths = ConfigPaths {
        global_exists: global_path.as_deref().is_some_and(Path::exists),
        global: global_path,
        local_exists: local.exists(),
        local,
        explicit: global.config.clone(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    println!("Config files, lowest precedence first\n");

    match paths.global {
        Some(ref gp) => println!("Global: {} ({})", gp.display(), exists_label(paths.global_exists)),
        None => println!("Global: not available (no home directory)"),
    }
    println!(
        "Local:  {} ({})",
        paths.local.display(),
        exists_label(paths.local_exists)
    );
    if let Some(ref explicit) = paths.explicit {
        println!(
            "\n--config {} ({}) replaces both",
            explicit.display(),
            exists_label(explicit.exists())
        );
    }

    Ok(())
}

fn execute_init(args: InitArgs, global: GlobalOptions) -> Result<()> {
    let loader = ConfigLoader::new();
    let path = if args.global {
        loader.init_global()?
    } else {
        loader.init_local(&working_dir()?)?
    };

    print_info(&format!("Configuration at {}", path.display()), global.quiet);
    Ok(())
}

fn exists_label(exists: bool) -> &'static str {
    match exists {
        true => "exists",
        false => "not found",
    }
}

/// Look up `a.b.c` in the serialized configuration.
fn get_config_value(config: &EcolensConfig, key: &str) -> Option<serde_json::Value> {
    let pointer = format!("/{}", key.replace('.', "/"));
    serde_json::to_value(config)
        .ok()?
        .pointer(&pointer)
        .cloned()
}
