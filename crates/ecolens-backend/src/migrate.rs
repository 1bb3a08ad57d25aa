//! Migration of a dataset into a Qdrant collection.
//!
//! Observations are embedded in batches and upserted with ids derived from
//! their content, so running a migration twice overwrites instead of
//! duplicating.

use ecolens_search::{EmbeddingProvider, ObservationPoint, QdrantStore, DEFAULT_COLLECTION};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dataset::DatasetRecord;
use crate::error::BackendError;
use crate::Result;

/// Records embedded and upserted per batch
pub const DEFAULT_MIGRATION_BATCH_SIZE: usize = 64;

/// Migration settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    /// Target collection
    pub collection: String,

    /// Records per embed/upsert batch
    pub batch_size: usize,

    /// Drop the collection before migrating
    pub recreate: bool,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            batch_size: DEFAULT_MIGRATION_BATCH_SIZE,
            recreate: false,
        }
    }
}

impl MigrationOptions {
    /// Options targeting a named collection.
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }

    /// Set the batch size (at least 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Drop and recreate the collection.
    pub fn with_recreate(mut self, recreate: bool) -> Self {
        self.recreate = recreate;
        self
    }
}

/// Outcome of a migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationStats {
    /// Records read
    pub records: usize,

    /// Points upserted
    pub upserted: usize,

    /// Embed/upsert batches
    pub batches: usize,

    /// Vector dimension of the collection
    pub dimension: usize,

    /// Whether the collection was created by this run
    pub created_collection: bool,

    /// Whether an existing collection was dropped first
    pub recreated: bool,
}

/// Migrate records into Qdrant.
pub async fn migrate_dataset(
    store: &QdrantStore,
    embedder: &dyn EmbeddingProvider,
    records: Vec<DatasetRecord>,
    options: &MigrationOptions,
) -> Result<MigrationStats> {
    migrate_dataset_with_progress(store, embedder, records, options, |_, _| {}).await
}

/// Migrate records into Qdrant, reporting `(done, total)` after every batch.
///
/// The collection is created on the first batch, sized by the provider's
/// dimension (or the first vector's when the provider does not report one).
/// An existing collection must already have that size.
pub async fn migrate_dataset_with_progress<F>(
    store: &QdrantStore,
    embedder: &dyn EmbeddingProvider,
    records: Vec<DatasetRecord>,
    options: &MigrationOptions,
    mut on_batch: F,
) -> Result<MigrationStats>
where
    F: FnMut(usize, usize) + Send,
{
    for (index, record) in records.iter().enumerate() {
        record.validate(index)?;
    }

    let collection = options.collection.as_str();
    let batch_size = options.batch_size.max(1);
    let total = records.len();

    let mut stats = MigrationStats {
        records: total,
        ..Default::default()
    };

    if options.recreate && store.collection_exists(collection).await? {
        info!("Dropping collection '{}' before migration", collection);
        store.delete_collection(collection).await?;
        stats.recreated = true;
    }

    if records.is_empty() {
        warn!("No records to migrate into '{}'", collection);
        return Ok(stats);
    }

    info!(
        "Migrating {} records into '{}' in batches of {}",
        total, collection, batch_size
    );

    let entries: Vec<_> = records
        .into_iter()
        .map(DatasetRecord::into_entry)
        .collect();
    let mut dimension: Option<usize> = None;

    for batch in entries.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|e| e.observation.clone()).collect();
        let vectors = embedder.embed(texts).await?;
        if vectors.len() != batch.len() {
            return Err(ecolens_search::SearchError::Embedding(format!(
                "provider returned {} vectors for {} observations",
                vectors.len(),
                batch.len()
            ))
            .into());
        }

        let expected = match dimension {
            Some(dim) => dim,
            None => {
                let dim = match embedder.embedding_dim() {
                    0 => vectors.first().map(Vec::len).unwrap_or(0),
                    reported => reported,
                };
                stats.created_collection = prepare_collection(store, collection, dim).await?;
                stats.dimension = dim;
                dimension = Some(dim);
                dim
            }
        };

        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(BackendError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        let points: Vec<ObservationPoint> = batch
            .iter()
            .cloned()
            .zip(vectors)
            .map(|(entry, vector)| ObservationPoint::new(entry, vector))
            .collect();

        let count = points.len();
        store.upsert_points(collection, points).await?;

        stats.batches += 1;
        stats.upserted += count;
        debug!("Migrated {}/{} records", stats.upserted, total);
        on_batch(stats.upserted, total);
    }

    info!(
        "Migrated {} records into '{}' ({} batches, dim={})",
        stats.upserted, collection, stats.batches, stats.dimension
    );
    Ok(stats)
}

/// Create the collection, or check an existing one has the right vector size.
async fn prepare_collection(store: &QdrantStore, collection: &str, dimension: usize) -> Result<bool> {
    if store.create_collection(collection, dimension as u64).await? {
        return Ok(true);
    }

    let existing = store
        .collection_info(collection)
        .await?
        .and_then(|summary| summary.vector_size);
    if let Some(size) = existing {
        if size as usize != dimension {
            return Err(BackendError::DimensionMismatch {
                expected: size as usize,
                actual: dimension,
            });
        }
    }
    Ok(false)
}
