//! Status command - show backend and embedding provider status

use anyhow::Result;
use clap::Args;
use ecolens_backend::{
    load_dataset, to_embedding_config, BackendKind, DatasetSource, DatasetStats, KnowledgeBase,
    KnowledgeBaseStatus, ProviderStatus, QdrantIndex,
};
use ecolens_config::{BackendMode, EcolensConfig};
use ecolens_search::create_provider;

use super::{load_config, LoadedConfig};
use crate::GlobalOptions;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also probe the embedding provider (may load the model or call the API)
    #[arg(long)]
    provider: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the status command
///
/// Inspects the configured knowledge base without embedding the dataset.
pub async fn execute(args: StatusArgs, global: GlobalOptions) -> Result<()> {
    let LoadedConfig { config, base_dir } = load_config(&global)?;

    let knowledge_base = match config.backend.mode {
        BackendMode::InMemory => dataset_status(&config, &base_dir),
        BackendMode::External => collection_status(&config).await,
    };
    let provider = if args.provider {
        Some(provider_status(&config).await)
    } else {
        None
    };

    if args.json {
        let mut status = serde_json::json!({
            "backend": config.backend.mode.to_string(),
            "embedding_provider": config.embedding.provider.to_string(),
            "similarity_threshold": config.ranking.similarity_threshold,
            "default_limit": config.ranking.default_limit,
        });
        match knowledge_base {
            Ok(ref kb) => status["knowledge_base"] = serde_json::to_value(kb)?,
            Err(ref e) => status["knowledge_base_error"] = serde_json::json!(e),
        }
        if let Some(ref provider) = provider {
            status["provider"] = serde_json::to_value(provider)?;
        }
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Ecolens Status");
    println!("==============\n");

    println!("Backend:    {}", config.backend.mode);
    println!("Embeddings: {}", config.embedding.provider);
    println!(
        "Ranking:    threshold {:.2}, default limit {}",
        config.ranking.similarity_threshold, config.ranking.default_limit
    );

    println!("\nKnowledge base");
    match knowledge_base {
        Ok(kb) => print_knowledge_base(&kb),
        Err(e) => println!("  Unavailable: {}", e),
    }

    if let Some(provider) = provider {
        println!("\nEmbedding provider");
        if provider.available {
            println!("  Device: {}", provider.device);
            if let Some(ref model) = provider.model {
                println!("  Model:  {}", model);
            }
            if let Some(latency) = provider.latency_ms {
                println!("  Latency: {} ms", latency);
            }
        } else {
            println!(
                "  Unavailable: {}",
                provider.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn dataset_status(
    config: &EcolensConfig,
    base_dir: &std::path::Path,
) -> std::result::Result<KnowledgeBaseStatus, String> {
    let source = DatasetSource::from_config(config, base_dir);
    let records = load_dataset(&source).map_err(|e| e.to_string())?;
    let stats = DatasetStats::from_records(&records);

    Ok(KnowledgeBaseStatus {
        kind: BackendKind::InMemory,
        location: source.path.display().to_string(),
        collection: None,
        entries: Some(stats.records as u64),
        dimension: None,
        languages: stats.languages.into_iter().collect(),
    })
}

async fn collection_status(
    config: &EcolensConfig,
) -> std::result::Result<KnowledgeBaseStatus, String> {
    let index = QdrantIndex::connect(&config.backend.qdrant)
        .await
        .map_err(|e| e.to_string())?;
    index.status().await.map_err(|e| e.to_string())
}

async fn provider_status(config: &EcolensConfig) -> ProviderStatus {
    let embedding = to_embedding_config(&config.embedding);
    let provider = match create_provider(&embedding) {
        Ok(provider) => provider,
        Err(e) => return ProviderStatus::unavailable(embedding.provider, e.to_string()),
    };

    match provider.check_status().await {
        Ok(status) => status,
        Err(e) => ProviderStatus::unavailable(provider.provider_type(), e.to_string()),
    }
}

fn print_knowledge_base(kb: &KnowledgeBaseStatus) {
    println!("  Kind:     {}", kb.kind);
    println!("  Location: {}", kb.location);
    if let Some(ref collection) = kb.collection {
        println!("  Collection: {}", collection);
    }
    if let Some(entries) = kb.entries {
        println!("  Entries:  {}", entries);
    }
    if let Some(dimension) = kb.dimension {
        println!("  Dimension: {}", dimension);
    }
    for (language, count) in &kb.languages {
        println!("    {:<12} {}", language, count);
    }
}
