//! Hybrid ranking of knowledge base candidates
//!
//! Combines exact keyword matching with vector similarity:
//!
//! 1. **Similarity**: the backend score when present, else cosine similarity
//!    between the query vector and the entry embedding.
//! 2. **Keyword match**: a snippet token equals an entry keyword, or equals one
//!    of the keyword's words (`string.format` has `string` and `format`).
//! 3. **Inclusion**: keyword match OR similarity at or above the threshold.
//! 4. **Dedup**: first included occurrence of an observation text wins.
//! 5. **Ordering**: stable sort by similarity, descending.
//! 6. **Truncation** to the requested limit.
//!
//! # Example
//!
//! ```ignore
//! use ecolens_search::ranker::{rank, Candidate, RankingOptions};
//! use ecolens_search::tokenizer::tokenize;
//!
//! let tokens = tokenize("x % y");
//! let ranked = rank(&tokens, &query_vector, candidates, 5, &RankingOptions::default());
//! ```

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::schema::ObservationEntry;
use crate::tokenizer::words;

/// Default minimum similarity for inclusion without a keyword match
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.2;

/// Ranking policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingOptions {
    /// Minimum similarity for inclusion when no keyword matched
    pub similarity_threshold: f32,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl RankingOptions {
    /// Create options with a custom threshold
    pub fn with_threshold(similarity_threshold: f32) -> Self {
        Self {
            similarity_threshold,
        }
    }
}

/// A knowledge base entry offered for ranking
#[derive(Debug, Clone)]
pub struct Candidate {
    /// The entry
    pub entry: Arc<ObservationEntry>,
    /// Similarity already computed by the backend, if any
    pub score: Option<f32>,
}

impl Candidate {
    /// Candidate scored locally by the ranker
    pub fn unscored(entry: Arc<ObservationEntry>) -> Self {
        Self { entry, score: None }
    }

    /// Candidate carrying a backend score
    pub fn scored(entry: Arc<ObservationEntry>, score: f32) -> Self {
        Self {
            entry,
            score: Some(score),
        }
    }
}

/// A candidate that passed the inclusion rule
#[derive(Debug, Clone)]
pub struct RankedObservation {
    /// The entry
    pub entry: Arc<ObservationEntry>,
    /// Similarity used for ordering
    pub score: f32,
    /// Whether a snippet token matched one of the entry keywords
    pub keyword_match: bool,
}

/// Rank candidates for a query.
///
/// Candidate order is significant: it breaks score ties and decides which
/// duplicate observation survives.
pub fn rank(
    tokens: &BTreeSet<String>,
    query_embedding: &[f32],
    candidates: Vec<Candidate>,
    limit: usize,
    options: &RankingOptions,
) -> Vec<RankedObservation> {
    if limit == 0 || candidates.is_empty() {
        return Vec::new();
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut included: Vec<RankedObservation> = Vec::new();

    for candidate in candidates {
        let score = candidate.score.map(sanitize).unwrap_or_else(|| {
            candidate
                .entry
                .embedding
                .as_deref()
                .map(|embedding| cosine_similarity(query_embedding, embedding))
                .unwrap_or(0.0)
        });
        let keyword_match = matches_keywords(tokens, &candidate.entry.keywords);

        if !keyword_match && score < options.similarity_threshold {
            continue;
        }

        if !seen.insert(candidate.entry.observation.clone()) {
            continue;
        }

        included.push(RankedObservation {
            entry: candidate.entry,
            score,
            keyword_match,
        });
    }

    // `sort_by` is stable: equal scores keep candidate order
    included.sort_by(|a, b| b.score.total_cmp(&a.score));
    included.truncate(limit);
    included
}

/// Whether any token matches any keyword.
///
/// Keywords are expected in entry form, trimmed and lowercased as
/// [`ObservationEntry::new`] stores them. A token matches a keyword equal to
/// it, which covers operators such as `%`, or any whole word inside it, split
/// the way [`tokenize`](crate::tokenizer::tokenize) splits snippets.
pub fn matches_keywords(tokens: &BTreeSet<String>, keywords: &[String]) -> bool {
    if tokens.is_empty() {
        return false;
    }

    keywords.iter().any(|keyword| {
        tokens.contains(keyword.as_str()) || words(keyword).any(|word| tokens.contains(word))
    })
}

/// Cosine similarity in [-1, 1].
///
/// Returns 0.0 for empty, zero-magnitude or dimension-mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    sanitize(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

fn sanitize(score: f32) -> f32 {
    if score.is_nan() {
        0.0
    } else {
        score
    }
}
