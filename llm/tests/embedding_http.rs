//! Raw-HTTP embedding transport against a wiremock server, including the
//! SDK-to-HTTP in-call fallback through the full service.

use llm::RequestContext;
use llm::embedding::EmbeddingService;
use llm::error::LlmError;
use llm::provider::EmbeddingTransport;
use llm::provider::http::HttpEmbeddingTransport;
use llm::provider::mock::MockEmbeddingTransport;
use llm::resilience::{BreakerConfig, CircuitBreaker, RetryPolicy};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn embedding_body(pairs: &[(usize, f32)]) -> serde_json::Value {
    serde_json::json!({
        "object": "list",
        "model": "text-embedding-3-small",
        "data": pairs
            .iter()
            .map(|(index, value)| serde_json::json!({
                "object": "embedding",
                "index": index,
                "embedding": [value, value, value],
            }))
            .collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn test_transport_parses_indexed_embeddings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(&[(0, 0.1), (1, 0.2)])))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpEmbeddingTransport::new(server.uri());
    let texts = vec!["a".to_string(), "b".to_string()];
    let data = transport
        .embed("sk-test", "text-embedding-3-small", &texts)
        .await
        .unwrap();

    assert_eq!(data.len(), 2);
    assert_eq!(data[0].index, 0);
    assert_eq!(data[1].vector, vec![0.2, 0.2, 0.2]);
}

#[tokio::test]
async fn test_transport_maps_429_to_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .mount(&server)
        .await;

    let transport = HttpEmbeddingTransport::new(server.uri());
    let err = transport
        .embed("sk-test", "m", &["a".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::RateLimited(_)));
}

#[tokio::test]
async fn test_transport_maps_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let transport = HttpEmbeddingTransport::new(server.uri());
    let err = transport
        .embed("sk-test", "m", &["a".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, LlmError::Api { status: 500, .. }));
}

#[tokio::test]
async fn test_service_falls_back_to_http_and_reorders() {
    let server = MockServer::start().await;
    // Backend answers out of input order; the service must re-sort.
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(embedding_body(&[(2, 0.3), (0, 0.1), (1, 0.2)])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let sdk = Arc::new(MockEmbeddingTransport::new());
    sdk.push(Err(LlmError::Network("sdk unreachable".into())));

    let runtime = Arc::new(config::RuntimeConfig::new(config::Settings::for_tests()));
    let service = EmbeddingService::new(
        runtime,
        sdk.clone(),
        Arc::new(HttpEmbeddingTransport::new(server.uri())),
        Arc::new(CircuitBreaker::new(
            "embedding.single",
            BreakerConfig::default(),
        )),
        Arc::new(CircuitBreaker::new(
            "embedding.batch",
            BreakerConfig::default(),
        )),
        RetryPolicy {
            retries: 0,
            initial_backoff: Duration::from_millis(1),
            jitter: false,
            ..RetryPolicy::default()
        },
    );

    let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let vectors = service
        .embed_many(&RequestContext::new(), &texts)
        .await
        .unwrap();

    assert_eq!(sdk.call_count(), 1);
    assert_eq!(vectors[0], vec![0.1, 0.1, 0.1]);
    assert_eq!(vectors[1], vec![0.2, 0.2, 0.2]);
    assert_eq!(vectors[2], vec![0.3, 0.3, 0.3]);
}
