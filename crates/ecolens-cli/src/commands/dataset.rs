//! Dataset command - validate and convert observation datasets

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use ecolens_backend::{convert_legacy, load_dataset, DatasetSource, DatasetStats};
use ecolens_config::{ConfigError, DatasetSchema};

use super::{load_config, print_info, resolve_path, LoadedConfig};
use crate::GlobalOptions;

/// Dataset maintenance commands
#[derive(Subcommand, Debug)]
pub enum DatasetCommand {
    /// Check that every record has the required fields
    Validate(ValidateArgs),

    /// Rewrite a legacy dataset in the canonical schema
    Convert(ConvertArgs),
}

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Dataset file (defaults to backend.dataset.path)
    path: Option<PathBuf>,

    /// Dataset schema (defaults to backend.dataset.schema)
    #[arg(long, value_parser = parse_schema)]
    schema: Option<DatasetSchema>,

    /// Print statistics as JSON
    #[arg(long)]
    json: bool,
}

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Legacy dataset (`lang`, `lang-keywords`)
    input: PathBuf,

    /// Canonical dataset to write
    output: PathBuf,

    /// Overwrite the output file if it exists
    #[arg(long)]
    force: bool,
}

fn parse_schema(s: &str) -> Result<DatasetSchema, String> {
    s.parse().map_err(|e: ConfigError| e.to_string())
}

/// Execute a dataset command
pub async fn execute(cmd: DatasetCommand, global: GlobalOptions) -> Result<()> {
    match cmd {
        DatasetCommand::Validate(args) => execute_validate(args, global),
        DatasetCommand::Convert(args) => execute_convert(args, global),
    }
}

fn execute_validate(args: ValidateArgs, global: GlobalOptions) -> Result<()> {
    let source = match args.path {
        Some(ref path) => DatasetSource::new(
            resolve_path(path)?,
            args.schema.unwrap_or_default(),
        ),
        None => {
            let LoadedConfig { config, base_dir } = load_config(&global)?;
            let mut source = DatasetSource::from_config(&config, &base_dir);
            if let Some(schema) = args.schema {
                source.schema = schema;
            }
            source
        }
    };

    let records = load_dataset(&source)
        .with_context(|| format!("Invalid dataset {}", source.path.display()))?;
    let stats = DatasetStats::from_records(&records);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!(
        "{}: {} records ({} schema)",
        source.path.display(),
        stats.records,
        source.schema
    );
    for (language, count) in &stats.languages {
        println!("  {:<12} {}", language, count);
    }
    if stats.duplicate_observations > 0 {
        print_info(
            &format!(
                "{} duplicate observation(s); duplicates collapse at search time",
                stats.duplicate_observations
            ),
            global.quiet,
        );
    }

    Ok(())
}

fn execute_convert(args: ConvertArgs, global: GlobalOptions) -> Result<()> {
    let input = resolve_path(&args.input)?;
    let output = resolve_path(&args.output)?;

    if output.exists() && !args.force {
        bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    let count = convert_legacy(&input, &output)
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    print_info(
        &format!(
            "Converted {} records: {} -> {}",
            count,
            input.display(),
            output.display()
        ),
        global.quiet,
    );
    Ok(())
}
