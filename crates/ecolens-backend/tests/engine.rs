//! End-to-end search scenarios over the in-memory knowledge base.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::*;
use ecolens_backend::{
    BackendError, DatasetSource, EngineOptions, ErrorKind, InMemoryIndex, SearchEngine,
    SearchRequest,
};
use ecolens_config::ResultShape;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const STATIC_OBS: &str = "Static variables stay in memory for the lifetime of the program";
const MODULUS_OBS: &str = "The modulus operator is expensive; prefer bit masks for powers of two";
const BUILDER_OBS: &str = "Use StringBuilder instead of String concatenation in loops";
const HOIST_OBS: &str = "Hoist invariant computations out of loops";
const ARRAYLIST_OBS: &str = "Size ArrayList instances up front";
const PY_LOOP_OBS: &str = "Prefer list comprehensions over explicit loops";

fn java_dataset() -> Vec<ecolens_backend::DatasetRecord> {
    vec![
        record("java", "Fields", &["static"], STATIC_OBS),
        record("java", "Operators", &["%"], MODULUS_OBS),
        record(
            "java",
            "Strings",
            &["StringBuilder", "String concatenation"],
            BUILDER_OBS,
        ),
        record("java", "Loops", &["for", "while"], HOIST_OBS),
        record("java", "Collections", &["ArrayList"], ARRAYLIST_OBS),
        record("python", "Loops", &["for"], PY_LOOP_OBS),
    ]
}

async fn java_engine() -> SearchEngine {
    engine(
        java_dataset(),
        StubEmbedder::new(DIM),
        EngineOptions::default().with_result_shape(ResultShape::Full),
    )
    .await
}

fn observations(results: &[ecolens_backend::Suggestion]) -> Vec<&str> {
    results.iter().map(|s| s.observation.as_str()).collect()
}

// ============================================================
// Keyword scenarios
// ============================================================

#[tokio::test]
async fn test_static_field_snippet_finds_static_entry() {
    let engine = java_engine().await;

    let results = engine.search("static String s;", "java", 5).await.unwrap();

    assert!(results.len() <= 5);
    assert!(observations(&results).contains(&STATIC_OBS));
    assert!(results
        .iter()
        .all(|s| s.language.as_deref() == Some("java")));
}

#[tokio::test]
async fn test_modulus_operator_snippet_finds_operator_entry() {
    let engine = java_engine().await;

    let results = engine.search("x % y", "java", 5).await.unwrap();

    assert_eq!(observations(&results), vec![MODULUS_OBS]);
    assert_eq!(results[0].keyword_match, Some(true));
}

#[tokio::test]
async fn test_multi_word_keyword_matches_whole_word() {
    let engine = java_engine().await;

    let results = engine
        .search("String s = a + b; // concatenation", "java", 5)
        .await
        .unwrap();
    assert!(observations(&results).contains(&BUILDER_OBS));

    // "str" is not a whole word of any keyword
    let results = engine.search("str x;", "java", 5).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_punctuated_keywords_match_whole_words() {
    const FORMAT_OBS: &str = "String.format parses its pattern on every call";
    const INCREMENT_OBS: &str = "Count down to zero instead of incrementing";
    let records = vec![
        record("java", "Strings", &["String.format"], FORMAT_OBS),
        record("java", "Loops", &["i++"], INCREMENT_OBS),
    ];
    let engine = engine(
        records,
        StubEmbedder::new(DIM),
        EngineOptions::default().with_result_shape(ResultShape::Full),
    )
    .await;

    let results = engine
        .search("String s = String.format(\"%d\", x);", "java", 5)
        .await
        .unwrap();
    assert_eq!(observations(&results), vec![FORMAT_OBS]);
    assert_eq!(results[0].keyword_match, Some(true));

    let results = engine
        .search("while (n > 0) { i++; n--; }", "java", 5)
        .await
        .unwrap();
    assert_eq!(observations(&results), vec![INCREMENT_OBS]);
}

#[tokio::test]
async fn test_keyword_match_included_regardless_of_similarity() {
    let embedder = StubEmbedder::new(DIM)
        .with("while (running) { tick(); }", query_vector())
        .with(HOIST_OBS, with_similarity(-0.9));
    let engine = engine(java_dataset(), embedder, EngineOptions::default()).await;

    let results = engine
        .search("while (running) { tick(); }", "java", 5)
        .await
        .unwrap();
    assert_eq!(observations(&results), vec![HOIST_OBS]);
}

// ============================================================
// Ordering and truncation
// ============================================================

#[tokio::test]
async fn test_limit_two_keeps_highest_similarity_earliest_on_ties() {
    let snippet = "int total = 0;";
    let records = vec![
        record("java", "A", &["synchronized"], "first strong"),
        record("java", "B", &["volatile"], "medium"),
        record("java", "C", &["transient"], "second strong"),
        record("java", "D", &["native"], "weak"),
        record("java", "E", &["assert"], "unrelated"),
    ];
    let embedder = StubEmbedder::new(DIM)
        .with(snippet, query_vector())
        .with("first strong", with_similarity(0.9))
        .with("medium", with_similarity(0.5))
        .with("second strong", with_similarity(0.9))
        .with("weak", with_similarity(0.1));
    let engine = engine(records, embedder, EngineOptions::default()).await;

    let first = engine.search(snippet, "java", 2).await.unwrap();
    assert_eq!(observations(&first), vec!["first strong", "second strong"]);

    let all = engine.search(snippet, "java", 10).await.unwrap();
    assert_eq!(
        observations(&all),
        vec!["first strong", "second strong", "medium"]
    );

    let again = engine.search(snippet, "java", 2).await.unwrap();
    assert_eq!(first, again);
}

#[tokio::test]
async fn test_keyword_only_matches_ordered_by_similarity() {
    let snippet = "for (int i = 0; i < n; i++) { list.add(i); }";
    let records = vec![
        record("java", "Loops", &["for"], "loop advice"),
        record("java", "Collections", &["list"], "list advice"),
    ];
    let embedder = StubEmbedder::new(DIM)
        .with(snippet, query_vector())
        .with("loop advice", with_similarity(0.05))
        .with("list advice", with_similarity(0.15));
    let engine = engine(records, embedder, EngineOptions::default()).await;

    let results = engine.search(snippet, "java", 5).await.unwrap();
    assert_eq!(observations(&results), vec!["list advice", "loop advice"]);
}

#[tokio::test]
async fn test_duplicate_observations_returned_once() {
    let records = vec![
        record("java", "Fields", &["static"], STATIC_OBS),
        record("java", "Memory", &["static"], STATIC_OBS),
    ];
    let engine = engine(
        records,
        StubEmbedder::new(DIM),
        EngineOptions::default(),
    )
    .await;

    let results = engine.search("static int n;", "java", 5).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].component, "Fields");
}

#[tokio::test]
async fn test_results_never_exceed_limit_or_repeat() {
    let engine = java_engine().await;

    for limit in 0..4 {
        let results = engine
            .search("static String s = a % b; for (;;) {}", "java", limit)
            .await
            .unwrap();
        assert!(results.len() <= limit);

        let unique: HashSet<&str> = observations(&results).into_iter().collect();
        assert_eq!(unique.len(), results.len());
    }
}

// ============================================================
// Empty results
// ============================================================

#[tokio::test]
async fn test_zero_limit_and_unknown_language_are_empty() {
    let engine = java_engine().await;

    assert!(engine.search("x % y", "java", 0).await.unwrap().is_empty());
    assert!(engine.search("x % y", "cobol", 5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_language_is_normalized() {
    let engine = java_engine().await;

    let results = engine.search("x % y", "  JAVA ", 5).await.unwrap();
    assert_eq!(observations(&results), vec![MODULUS_OBS]);
}

// ============================================================
// Validation
// ============================================================

#[tokio::test]
async fn test_blank_input_rejected() {
    let engine = java_engine().await;

    let err = engine.search("   ", "java", 5).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = engine.search("x % y", "", 5).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_negative_limit_rejected() {
    let engine = java_engine().await;

    let err = engine
        .search_request(&SearchRequest::new("x % y", "java", -3))
        .await
        .unwrap_err();
    assert!(matches!(err, BackendError::Validation(_)));
}

// ============================================================
// Concurrency and determinism
// ============================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_searches_agree() {
    let engine = Arc::new(java_engine().await);
    let expected = engine
        .search("static String s = a % b;", "java", 5)
        .await
        .unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .search("static String s = a % b;", "java", 5)
                    .await
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        let results = result.expect("task panicked").unwrap();
        assert_eq!(results, expected);
    }
}

// ============================================================
// Dataset-backed engines
// ============================================================

#[tokio::test]
async fn test_legacy_dataset_serves_searches() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "legacy.json",
        r#"[
            {"lang": "Java", "component": "Operators", "lang-keywords": "%, modulus", "observation": "Modulus is costly"},
            {"lang": "python", "component": "Loops", "lang-keywords": "for", "observation": "Prefer comprehensions"}
        ]"#,
    );

    let embedder = Arc::new(StubEmbedder::new(DIM));
    let index = InMemoryIndex::load(&DatasetSource::legacy(&path), embedder.as_ref())
        .await
        .unwrap();
    let engine = SearchEngine::new(Arc::new(index), embedder, EngineOptions::default());

    let results = engine.search("a % b", "java", 5).await.unwrap();
    assert_eq!(observations(&results), vec!["Modulus is costly"]);
    assert_eq!(results[0].component, "Operators");
    assert!(results[0].score.is_none());
}

#[tokio::test]
async fn test_missing_field_aborts_load_with_index() {
    let dir = TempDir::new().unwrap();
    let path = write_file(
        &dir,
        "data.json",
        r#"[
            {"language": "java", "component": "Fields", "keywords": ["static"], "observation": "a"},
            {"language": "java", "component": "Loops", "keywords": ["for"], "observation": "b"},
            {"language": "java", "keywords": ["%"], "observation": "c"}
        ]"#,
    );

    let embedder = StubEmbedder::new(DIM);
    let err = InMemoryIndex::load(&DatasetSource::canonical(&path), &embedder)
        .await
        .unwrap_err();

    assert!(matches!(err, BackendError::InvalidRecord { index: 2, .. }));
    assert!(err.to_string().contains("component"));
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn test_status_reports_entries() {
    let engine = java_engine().await;

    let status = engine.backend().status().await.unwrap();
    assert_eq!(status.entries, Some(6));
    assert_eq!(status.dimension, Some(DIM as u64));
    assert!(engine.backend().health_check().await.unwrap());
}
