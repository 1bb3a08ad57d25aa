//! Observation entries and the Qdrant point layout
//!
//! An observation is one piece of pre-authored energy-efficiency advice tied to
//! a language and a set of construct keywords.

use qdrant_client::qdrant::Distance;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default collection holding the observations
pub const DEFAULT_COLLECTION: &str = "efficiency_observations";

/// Distance metric used for observation collections
pub const DISTANCE: Distance = Distance::Cosine;

/// Payload field names stored with each point
pub mod fields {
    /// Normalized language identifier (keyword-indexed for filtering)
    pub const LANGUAGE: &str = "language";
    /// Component label
    pub const COMPONENT: &str = "component";
    /// Construct keywords (list of strings)
    pub const KEYWORDS: &str = "keywords";
    /// Advice text
    pub const OBSERVATION: &str = "observation";
}

/// A single knowledge base entry
///
/// Immutable once loaded; shared behind `Arc` between the index and results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationEntry {
    /// Normalized (lowercase, trimmed) language identifier
    pub language: String,
    /// Short category label ("Collections", "Operators", ...)
    pub component: String,
    /// Construct keywords, lowercase
    pub keywords: Vec<String>,
    /// Free-text advice
    pub observation: String,
    /// Embedding of `observation`; absent for entries scored remotely
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

impl ObservationEntry {
    /// Build an entry, normalizing language and keywords.
    pub fn new(
        language: impl AsRef<str>,
        component: impl Into<String>,
        keywords: impl IntoIterator<Item = impl AsRef<str>>,
        observation: impl Into<String>,
    ) -> Self {
        Self {
            language: normalize_language(language.as_ref()),
            component: component.into(),
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            observation: observation.into(),
            embedding: None,
        }
    }

    /// Attach a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Stable point id for this entry.
    pub fn point_id(&self) -> u64 {
        ObservationPoint::generate_id(&self.language, &self.component, &self.observation)
    }
}

/// Normalize a language identifier (trim + lowercase).
pub fn normalize_language(language: &str) -> String {
    language.trim().to_lowercase()
}

/// A point to upsert into the observations collection
#[derive(Debug, Clone)]
pub struct ObservationPoint {
    /// Stable point id (see [`ObservationPoint::generate_id`])
    pub id: u64,
    /// Embedding of the observation text
    pub vector: Vec<f32>,
    /// Payload fields
    pub entry: ObservationEntry,
}

impl ObservationPoint {
    /// Build a point from an entry and its vector.
    pub fn new(entry: ObservationEntry, vector: Vec<f32>) -> Self {
        Self {
            id: entry.point_id(),
            vector,
            entry,
        }
    }

    /// Generate a stable point id from the identifying fields.
    ///
    /// First 8 bytes of SHA-256 over the NUL-separated fields, big-endian.
    /// Re-running a migration overwrites points instead of duplicating them.
    pub fn generate_id(language: &str, component: &str, observation: &str) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(language.as_bytes());
        hasher.update([0u8]);
        hasher.update(component.as_bytes());
        hasher.update([0u8]);
        hasher.update(observation.as_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(bytes)
    }
}

/// Search result from the observations collection
#[derive(Debug, Clone)]
pub struct ObservationHit {
    /// Cosine similarity computed by the server
    pub score: f32,
    /// Entry rebuilt from the payload
    pub entry: ObservationEntry,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_normalizes_fields() {
        let entry = ObservationEntry::new(
            "  Java ",
            "Collections",
            ["ArrayList", " ", "for each"],
            "Prefer ArrayList",
        );
        assert_eq!(entry.language, "java");
        assert_eq!(entry.keywords, vec!["arraylist", "for each"]);
        assert!(entry.embedding.is_none());
    }

    #[test]
    fn test_point_id_is_stable() {
        let id1 = ObservationPoint::generate_id("java", "Strings", "Use StringBuilder");
        let id2 = ObservationPoint::generate_id("java", "Strings", "Use StringBuilder");
        let id3 = ObservationPoint::generate_id("python", "Strings", "Use StringBuilder");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn test_point_id_field_boundaries() {
        // Moving text across a field boundary must change the id
        let a = ObservationPoint::generate_id("java", "ab", "c");
        let b = ObservationPoint::generate_id("java", "a", "bc");
        assert_ne!(a, b);
    }

    #[test]
    fn test_embedding_not_serialized() {
        let entry = ObservationEntry::new("c", "Loops", ["for"], "Hoist invariants")
            .with_embedding(vec![0.5; 4]);
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("embedding").is_none());
        assert_eq!(json["language"], "c");
    }
}
