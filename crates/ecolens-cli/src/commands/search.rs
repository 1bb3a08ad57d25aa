//! Search command - energy-efficiency suggestions for a snippet

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use ecolens_backend::{SearchRequest, Suggestion};
use ecolens_config::ResultShape;

use super::{create_engine, resolve_path};
use crate::GlobalOptions;

/// Arguments for the search command
#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Code snippet (read from --file or stdin when omitted)
    #[arg(conflicts_with = "file")]
    snippet: Option<String>,

    /// Read the snippet from a file
    #[arg(long, short = 'f')]
    file: Option<PathBuf>,

    /// Programming language of the snippet (e.g., java, python)
    #[arg(long, short = 'l')]
    language: String,

    /// Maximum number of suggestions (defaults to ranking.default_limit)
    #[arg(long, short = 'n', allow_negative_numbers = true)]
    limit: Option<i64>,

    /// Output format: text (default), json
    #[arg(long, short = 'o', value_enum, default_value = "text")]
    output: OutputFormat,

    /// Include language, keywords, score and keyword match in results
    #[arg(long)]
    full: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

/// Execute the search command
pub async fn execute(args: SearchArgs, global: GlobalOptions) -> Result<()> {
    let request = SearchRequest {
        snippet: read_snippet(&args)?,
        language: args.language.clone(),
        limit: args.limit,
    };
    request.validate()?;

    let shape = args.full.then_some(ResultShape::Full);
    let engine = create_engine(&global, shape).await?;
    let suggestions = engine
        .search_request(&request)
        .await
        .context("Search failed")?;

    match args.output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&suggestions)
                .context("Failed to serialize suggestions")?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            if suggestions.is_empty() {
                if !global.quiet {
                    eprintln!("No suggestions for this {} snippet", request.language);
                }
                return Ok(());
            }
            print_suggestions(&suggestions, global.quiet);
        }
    }

    Ok(())
}

/// Snippet from the positional argument, a file, or piped stdin.
fn read_snippet(args: &SearchArgs) -> Result<String> {
    if let Some(ref snippet) = args.snippet {
        return Ok(snippet.clone());
    }

    if let Some(ref file) = args.file {
        let path = resolve_path(file)?;
        return std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read snippet from {}", path.display()));
    }

    let mut stdin = std::io::stdin();
    if stdin.is_terminal() {
        bail!("No snippet given: pass it as an argument, with --file, or on stdin");
    }
    let mut snippet = String::new();
    stdin
        .read_to_string(&mut snippet)
        .context("Failed to read snippet from stdin")?;
    Ok(snippet)
}

fn print_suggestions(suggestions: &[Suggestion], quiet: bool) {
    if !quiet {
        println!("{} suggestion(s):\n", suggestions.len());
    }

    for (i, suggestion) in suggestions.iter().enumerate() {
        println!(
            "{}. [{}] {}",
            i + 1,
            suggestion.component,
            suggestion.observation
        );

        if let Some(score) = suggestion.score {
            let matched = if suggestion.keyword_match == Some(true) {
                "  keyword match"
            } else {
                ""
            };
            println!("   Score: {:.3}{}", score, matched);
        }
        if let Some(ref keywords) = suggestion.keywords {
            if !keywords.is_empty() {
                println!("   Keywords: {}", keywords.join(", "));
            }
        }
        println!();
    }
}
