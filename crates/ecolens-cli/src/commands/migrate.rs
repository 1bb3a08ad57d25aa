//! Migrate command - embed the dataset and load it into Qdrant

use anyhow::{Context, Result};
use clap::Args;
use ecolens_backend::{
    load_dataset, migrate_dataset_with_progress, store_config, to_embedding_config,
    DatasetSource, MigrationOptions, DEFAULT_MIGRATION_BATCH_SIZE,
};
use ecolens_search::{create_provider, QdrantStore};

use super::{load_config, print_info, LoadedConfig};
use crate::progress::Feedback;
use crate::GlobalOptions;

/// Arguments for the migrate command
///
/// The target collection comes from `--collection` or `backend.qdrant.collection`.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Observations embedded and upserted per request
    #[arg(long, default_value_t = DEFAULT_MIGRATION_BATCH_SIZE)]
    batch_size: usize,

    /// Drop the collection before loading
    #[arg(long)]
    recreate: bool,

    /// Print migration statistics as JSON
    #[arg(long)]
    json: bool,
}

/// Execute the migrate command
pub async fn execute(args: MigrateArgs, global: GlobalOptions) -> Result<()> {
    let LoadedConfig { config, base_dir } = load_config(&global)?;
    config.embedding.validate()?;

    let source = DatasetSource::from_config(&config, &base_dir);
    let records = load_dataset(&source)
        .with_context(|| format!("Failed to load dataset {}", source.path.display()))?;
    print_info(
        &format!(
            "Loaded {} records from {}",
            records.len(),
            source.path.display()
        ),
        global.quiet,
    );

    let embedder = create_provider(&to_embedding_config(&config.embedding))
        .context("Failed to create embedding provider")?;
    let store = QdrantStore::connect(store_config(&config.backend.qdrant))
        .await
        .context("Failed to connect to Qdrant")?;

    let collection = config.backend.qdrant.collection.clone();
    let options = MigrationOptions::new(collection.as_str())
        .with_batch_size(args.batch_size)
        .with_recreate(args.recreate);

    let quiet = global.quiet || args.json;
    let progress = Feedback::counter(records.len() as u64, "Migrating", quiet);
    let result = migrate_dataset_with_progress(
        &store,
        embedder.as_ref(),
        records,
        &options,
        |done, _total| progress.set_position(done as u64),
    )
    .await;

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            progress.fail("Migration failed");
            return Err(e).context(format!("Failed to migrate into '{}'", collection));
        }
    };

    if stats.upserted == 0 {
        progress.warn("Dataset is empty, nothing migrated");
    } else {
        progress.succeed(&format!(
            "Migrated {} records into '{}'",
            stats.upserted, collection
        ));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else if !global.quiet {
        println!("Collection: {} ({})", collection, store.url());
        println!("Records:    {}", stats.records);
        println!("Upserted:   {} in {} batch(es)", stats.upserted, stats.batches);
        println!("Dimension:  {}", stats.dimension);
        if stats.created_collection {
            println!("Created collection");
        }
        if stats.recreated {
            println!("Recreated collection");
        }
    }

    Ok(())
}
