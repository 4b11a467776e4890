#![cfg(feature = "pinecone")]

//! Pinecone wire-format tests against a mock data-plane host.

use serde_json::json;
use std::collections::HashMap;
use vectors::VectorBackend;
use vectors::filter::Filter;
use vectors::pinecone::PineconeBackend;
use vectors::types::{QueryRequest, VectorRecord};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_query_sends_normalized_filter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(header("Api-Key", "pc-test"))
        .and(body_partial_json(json!({
            "namespace": "docs",
            "topK": 5,
            "filter": {"source": {"$eq": "manual"}},
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "matches": [
                {"id": "a", "score": 0.91, "metadata": {"source": "manual"}},
                {"id": "b", "score": 0.42},
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = PineconeBackend::with_host(server.uri(), "pc-test", 3);
    let filter = Filter::parse(&json!({"source": "manual"})).unwrap();
    let matches = backend
        .query(
            &QueryRequest::new("docs", vec![0.1, 0.2, 0.3])
                .with_top_k(5)
                .with_filter(filter),
        )
        .await
        .unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].id, "a");
    assert!(matches[1].metadata.is_empty());
}

#[tokio::test]
async fn test_upsert_and_stats() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/vectors/upsert"))
        .and(body_partial_json(json!({"namespace": "docs"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"upsertedCount": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/describe_index_stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "namespaces": {"docs": {"vectorCount": 12}},
            "dimension": 3,
        })))
        .mount(&server)
        .await;

    let backend = PineconeBackend::with_host(server.uri(), "pc-test", 3);
    let outcome = backend
        .upsert(
            "docs",
            vec![VectorRecord::new("a", vec![0.1, 0.2, 0.3], HashMap::new())],
        )
        .await
        .unwrap();
    assert_eq!(outcome.upserted_count, 1);

    let stats = backend.stats("docs").await.unwrap();
    assert_eq!(stats.vector_count, 12);
    assert_eq!(stats.dimension, 3);

    assert_eq!(backend.list_namespaces().await.unwrap(), vec!["docs"]);
}

#[tokio::test]
async fn test_delete_by_filter_rejects_empty_filter() {
    // No delete endpoint mounted: the rejection happens before any
    // request is sent.
    let server = MockServer::start().await;
    let backend = PineconeBackend::with_host(server.uri(), "pc-test", 3);

    let empty = Filter::parse(&json!({})).unwrap();
    let err = backend.delete_by_filter("docs", &empty).await.unwrap_err();
    assert!(matches!(err, vectors::VectorError::InvalidFilter(_)));
}

#[tokio::test]
async fn test_rate_limit_maps_to_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/vectors/delete"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let backend = PineconeBackend::with_host(server.uri(), "pc-test", 3);
    let err = backend
        .delete_by_ids("docs", &["a".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, vectors::VectorError::RateLimited(_)));
    assert!(err.is_retryable());
}
