//! Common test utilities for ecolens-search integration tests.
//!
//! Qdrant tests require Qdrant running at localhost:6334.
//! Start with: `docker run -p 6334:6334 qdrant/qdrant`

#![allow(dead_code)]

use ecolens_search::{ObservationEntry, ObservationPoint};

/// Generate a unique collection name for test isolation
pub fn unique_collection(prefix: &str) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis();
    format!("{}_{}", prefix, timestamp)
}

/// Point with a hand-made unit vector pointing along `axis`
pub fn axis_point(
    language: &str,
    keywords: &[&str],
    observation: &str,
    axis: usize,
    dim: usize,
) -> ObservationPoint {
    let mut vector = vec![0.0; dim];
    vector[axis % dim] = 1.0;
    ObservationPoint::new(
        ObservationEntry::new(language, "Test", keywords.iter().copied(), observation),
        vector,
    )
}

/// Unit vector along `axis`
pub fn axis_vector(axis: usize, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0; dim];
    vector[axis % dim] = 1.0;
    vector
}
