//! Thin async wrapper over the Qdrant gRPC client.
//!
//! Knows the observation payload layout and the `language` keyword index;
//! ranking happens elsewhere.

use std::collections::HashMap;
use std::time::Duration;

use qdrant_client::qdrant::{
    value::Kind, vectors_config::Config, Condition, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, FieldType, Filter, PointStruct, SearchParamsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParams, VectorsConfig,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{Result, SearchError};
use crate::schema::{fields, ObservationEntry, ObservationHit, ObservationPoint, DISTANCE};

/// Where the index lives and how to authenticate.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// gRPC endpoint, port 6334 by default
    pub url: String,
    pub api_key: Option<String>,
    /// Deadline applied to every request
    pub timeout_secs: u64,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self::with_url("http://localhost:6334")
    }
}

impl QdrantConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            timeout_secs: 30,
        }
    }

    pub fn api_key(self, key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..self
        }
    }
}

/// Summary of a collection's shape and size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Collection name
    pub name: String,
    /// Number of stored points, when reported
    pub points_count: Option<u64>,
    /// Vector size of the unnamed vector, when configured
    pub vector_size: Option<u64>,
}

/// Connected handle to one Qdrant server.
pub struct QdrantStore {
    client: Qdrant,
    url: String,
}

impl QdrantStore {
    /// Build a client and make one round trip so a bad URL or key fails here.
    pub async fn connect(config: QdrantConfig) -> Result<Self> {
        let QdrantConfig {
            url,
            api_key,
            timeout_secs,
        } = config;
        info!("Connecting to Qdrant at {}", url);

        let mut builder = Qdrant::from_url(&url).timeout(Duration::from_secs(timeout_secs));
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| {
                SearchError::Connection(format!("invalid client settings for {}: {}", url, e))
            })?;

        let collections = client
            .list_collections()
            .await
            .map_err(|e| SearchError::Connection(format!("{} is unreachable: {}", url, e)))?;
        debug!(
            "Qdrant at {} holds {} collections",
            url,
            collections.collections.len()
        );

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.client.collection_exists(name).await?)
    }

    /// Create the observations collection with cosine distance
    ///
    /// Also creates a keyword index on `language` for server-side filtering.
    /// Returns `false` if the collection already existed.
    pub async fn create_collection(&self, name: &str, dimension: u64) -> Result<bool> {
        if self.collection_exists(name).await? {
            debug!("Collection '{}' already exists", name);
            return Ok(false);
        }

        info!(
            "Creating collection '{}' (dim={}, distance={:?})",
            name, dimension, DISTANCE
        );

        let vectors_config = VectorsConfig {
            config: Some(Config::Params(VectorParams {
                size: dimension,
                distance: DISTANCE.into(),
                ..Default::default()
            })),
        };

        self.client
            .create_collection(CreateCollectionBuilder::new(name).vectors_config(vectors_config))
            .await?;

        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                name,
                fields::LANGUAGE,
                FieldType::Keyword,
            ))
            .await?;

        info!("Collection '{}' created successfully", name);
        Ok(true)
    }

    /// Drop `name`; a missing collection is not an error.
    pub async fn delete_collection(&self, name: &str) -> Result<()> {
        if self.collection_exists(name).await? {
            info!("Dropping collection '{}'", name);
            self.client.delete_collection(name).await?;
        }
        Ok(())
    }

    /// Get collection size and vector configuration
    pub async fn collection_info(&self, name: &str) -> Result<Option<CollectionSummary>> {
        if !self.collection_exists(name).await? {
            return Ok(None);
        }

        let response = self.client.collection_info(name).await?;
        let info = response
            .result
            .ok_or_else(|| SearchError::Qdrant(format!("No info returned for '{}'", name)))?;

        let vector_size = info
            .config
            .as_ref()
            .and_then(|c| c.params.as_ref())
            .and_then(|p| p.vectors_config.as_ref())
            .and_then(|v| v.config.as_ref())
            .and_then(|c| match c {
                Config::Params(params) => Some(params.size),
                Config::ParamsMap(_) => None,
            });

        Ok(Some(CollectionSummary {
            name: name.to_string(),
            points_count: info.points_count,
            vector_size,
        }))
    }

    /// Write `points`, replacing any with the same id, and wait until they are searchable.
    pub async fn upsert_points(&self, collection: &str, points: Vec<ObservationPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        debug!("Writing {} points to '{}'", points.len(), collection);

        let points = points
            .into_iter()
            .map(|p| -> Result<PointStruct> {
                let payload = Payload::try_from(json!({
                    fields::LANGUAGE: p.entry.language,
                    fields::COMPONENT: p.entry.component,
                    fields::KEYWORDS: p.entry.keywords,
                    fields::OBSERVATION: p.entry.observation,
                }))?;
                Ok(PointStruct::new(p.id, p.vector, payload))
            })
            .collect::<Result<Vec<PointStruct>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await?;
        Ok(())
    }

    /// Exact similarity search restricted to one language
    ///
    /// Hits whose payload lacks a required field are skipped.
    pub async fn search_by_language(
        &self,
        collection_name: &str,
        language: &str,
        query_vector: Vec<f32>,
        limit: u64,
    ) -> Result<Vec<ObservationHit>> {
        let filter = Filter::must([Condition::matches(fields::LANGUAGE, language.to_string())]);

        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection_name, query_vector, limit)
                    .filter(filter)
                    .params(SearchParamsBuilder::default().exact(true))
                    .with_payload(true)
                    .with_vectors(false),
            )
            .await?;

        let total = response.result.len();
        let hits: Vec<ObservationHit> = response
            .result
            .into_iter()
            .filter_map(|point| match entry_from_payload(&point.payload) {
                Some(entry) => Some(ObservationHit {
                    score: point.score,
                    entry,
                }),
                None => {
                    warn!(
                        "Skipping point {:?} in '{}': payload is missing required fields",
                        point.id, collection_name
                    );
                    None
                }
            })
            .collect();

        debug!(
            "Qdrant returned {} hits for language '{}' ({} usable)",
            total,
            language,
            hits.len()
        );

        Ok(hits)
    }
}

/// Rebuild an entry from a point payload.
///
/// `language`, `component` and `observation` must be non-empty strings;
/// `keywords` may be absent (treated as empty).
pub fn entry_from_payload(payload: &HashMap<String, Value>) -> Option<ObservationEntry> {
    let text = |key: &str| match payload.get(key)?.as_str() {
        Some(value) if !value.trim().is_empty() => Some(value.to_string()),
        _ => None,
    };

    let language = text(fields::LANGUAGE)?;
    let component = text(fields::COMPONENT)?;
    let observation = text(fields::OBSERVATION)?;

    let keywords: Vec<String> = payload
        .get(fields::KEYWORDS)
        .and_then(|v| match &v.kind {
            Some(Kind::ListValue(list)) => Some(&list.values),
            _ => None,
        })
        .map(|values| {
            values
                .iter()
                .filter_map(|k| k.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();

    Some(ObservationEntry::new(
        language,
        component,
        keywords,
        observation,
    ))
}
