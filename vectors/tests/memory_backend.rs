//! Contract tests against the in-memory reference backend.

use serde_json::json;
use std::collections::HashMap;
use vectors::filter::Filter;
use vectors::memory::MemoryBackend;
use vectors::types::{QueryRequest, VectorRecord};
use vectors::VectorBackend;

fn record(id: &str, vector: Vec<f32>, pairs: &[(&str, serde_json::Value)]) -> VectorRecord {
    let metadata: HashMap<String, serde_json::Value> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect();
    VectorRecord::new(id, vector, metadata)
}

#[tokio::test]
async fn test_upsert_is_idempotent_per_id() {
    let backend = MemoryBackend::new(2);
    backend
        .upsert("docs", vec![record("a", vec![1.0, 0.0], &[])])
        .await
        .unwrap();
    backend
        .upsert("docs", vec![record("a", vec![0.0, 1.0], &[])])
        .await
        .unwrap();

    let stats = backend.stats("docs").await.unwrap();
    assert_eq!(stats.vector_count, 1);

    // The surviving record holds the second call's vector.
    let matches = backend
        .query(&QueryRequest::new("docs", vec![0.0, 1.0]))
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert!((matches[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_score_orientation_and_monotonicity() {
    let backend = MemoryBackend::new(2);
    backend
        .upsert(
            "docs",
            vec![
                record("exact", vec![1.0, 0.0], &[]),
                record("close", vec![1.0, 0.2], &[]),
                record("far", vec![0.0, 1.0], &[]),
            ],
        )
        .await
        .unwrap();

    let matches = backend
        .query(&QueryRequest::new("docs", vec![1.0, 0.0]).with_top_k(3))
        .await
        .unwrap();

    assert_eq!(matches[0].id, "exact");
    assert!((matches[0].score - 1.0).abs() < 1e-6);
    assert_eq!(matches[1].id, "close");
    assert_eq!(matches[2].id, "far");
    assert!(matches[0].score > matches[1].score);
    assert!(matches[1].score > matches[2].score);
}

#[tokio::test]
async fn test_query_honors_filter_and_top_k() {
    let backend = MemoryBackend::new(2);
    backend
        .upsert(
            "docs",
            vec![
                record("a", vec![1.0, 0.0], &[("source", json!("manual"))]),
                record("b", vec![0.9, 0.1], &[("source", json!("crawl"))]),
                record("c", vec![0.8, 0.2], &[("source", json!("manual"))]),
            ],
        )
        .await
        .unwrap();

    let filter = Filter::parse(&json!({"source": "manual"})).unwrap();
    let matches = backend
        .query(
            &QueryRequest::new("docs", vec![1.0, 0.0])
                .with_top_k(1)
                .with_filter(filter),
        )
        .await
        .unwrap();

    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "a");
}

#[tokio::test]
async fn test_delete_by_filter_in_membership() {
    let backend = MemoryBackend::new(2);
    backend
        .upsert(
            "jobs",
            vec![
                record("j1", vec![1.0, 0.0], &[("status", json!("pending"))]),
                record("j2", vec![0.0, 1.0], &[("status", json!("failed"))]),
                record("j3", vec![1.0, 1.0], &[("status", json!("done"))]),
                record("j4", vec![0.5, 0.5], &[]),
            ],
        )
        .await
        .unwrap();

    let filter = Filter::parse(&json!({"status": {"$in": ["pending", "failed"]}})).unwrap();
    let outcome = backend.delete_by_filter("jobs", &filter).await.unwrap();
    assert_eq!(outcome.deleted_count, 2);

    let remaining = backend
        .query(&QueryRequest::new("jobs", vec![1.0, 0.0]).with_top_k(10))
        .await
        .unwrap();
    let mut ids: Vec<&str> = remaining.iter().map(|m| m.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["j3", "j4"]);
}

#[tokio::test]
async fn test_delete_by_filter_rejects_empty_filter() {
    let backend = MemoryBackend::new(2);
    backend
        .upsert(
            "jobs",
            vec![
                record("j1", vec![1.0, 0.0], &[("status", json!("pending"))]),
                record("j2", vec![0.0, 1.0], &[]),
            ],
        )
        .await
        .unwrap();

    let empty = Filter::parse(&json!({})).unwrap();
    let err = backend.delete_by_filter("jobs", &empty).await.unwrap_err();
    assert!(matches!(err, vectors::VectorError::InvalidFilter(_)));

    // Nothing was deleted; a namespace wipe goes through purge_namespace.
    assert_eq!(backend.stats("jobs").await.unwrap().vector_count, 2);
}

#[tokio::test]
async fn test_delete_by_ids_counts_only_existing() {
    let backend = MemoryBackend::new(2);
    backend
        .upsert("docs", vec![record("a", vec![1.0, 0.0], &[])])
        .await
        .unwrap();

    let outcome = backend
        .delete_by_ids("docs", &["a".to_string(), "missing".to_string()])
        .await
        .unwrap();
    assert_eq!(outcome.deleted_count, 1);
    assert_eq!(backend.stats("docs").await.unwrap().vector_count, 0);
}

#[tokio::test]
async fn test_namespaces_are_isolated() {
    let backend = MemoryBackend::new(2);
    backend
        .upsert("alpha", vec![record("a", vec![1.0, 0.0], &[])])
        .await
        .unwrap();
    backend
        .upsert("beta", vec![record("b", vec![0.0, 1.0], &[])])
        .await
        .unwrap();

    assert_eq!(
        backend.list_namespaces().await.unwrap(),
        vec!["alpha".to_string(), "beta".to_string()]
    );

    let matches = backend
        .query(&QueryRequest::new("alpha", vec![1.0, 0.0]))
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].id, "a");

    backend.purge_namespace("alpha").await.unwrap();
    assert_eq!(
        backend.list_namespaces().await.unwrap(),
        vec!["beta".to_string()]
    );
    assert!(
        backend
            .query(&QueryRequest::new("alpha", vec![1.0, 0.0]))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_query_unknown_namespace_is_empty() {
    let backend = MemoryBackend::new(2);
    let matches = backend
        .query(&QueryRequest::new("nowhere", vec![1.0, 0.0]))
        .await
        .unwrap();
    assert!(matches.is_empty());

    let stats = backend.stats("nowhere").await.unwrap();
    assert_eq!(stats.vector_count, 0);
}
