//! Embedding service: single and batch vector generation. Tries the SDK
//! transport first and falls back to raw HTTP within the same call; each
//! operation kind sits behind its own breaker with its own deadline.

use crate::context::RequestContext;
use crate::error::{LlmError, LlmResult};
use crate::provider::EmbeddingTransport;
use crate::resilience::{BreakerConfig, CircuitBreaker, RetryPolicy, with_retry};
use config::RuntimeConfig;
use std::sync::Arc;

pub struct EmbeddingService {
    runtime: Arc<RuntimeConfig>,
    sdk: Arc<dyn EmbeddingTransport>,
    http: Arc<dyn EmbeddingTransport>,
    single_breaker: Arc<CircuitBreaker>,
    batch_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl EmbeddingService {
    pub fn new(
        runtime: Arc<RuntimeConfig>,
        sdk: Arc<dyn EmbeddingTransport>,
        http: Arc<dyn EmbeddingTransport>,
        single_breaker: Arc<CircuitBreaker>,
        batch_breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            runtime,
            sdk,
            http,
            single_breaker,
            batch_breaker,
            retry,
        }
    }

    pub fn from_settings(runtime: Arc<RuntimeConfig>) -> Self {
        let settings = runtime.settings().clone();
        let single_breaker = Arc::new(CircuitBreaker::new(
            "embedding.single",
            BreakerConfig::from_settings(&settings.breaker, settings.breaker.call_timeout_ms),
        ));
        // Batch calls carry a longer deadline than single ones.
        let batch_breaker = Arc::new(CircuitBreaker::new(
            "embedding.batch",
            BreakerConfig::from_settings(&settings.breaker, settings.breaker.batch_call_timeout_ms),
        ));
        Self::new(
            runtime,
            Arc::new(crate::provider::openai::SdkEmbeddingTransport::new()),
            Arc::new(crate::provider::http::HttpEmbeddingTransport::new(
                settings.embedding.base_url.clone(),
            )),
            single_breaker,
            batch_breaker,
            RetryPolicy::with_retries(settings.embedding.retries),
        )
    }

    pub fn single_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.single_breaker
    }

    pub fn batch_breaker(&self) -> &Arc<CircuitBreaker> {
        &self.batch_breaker
    }

    pub async fn reset_for_tests(&self) {
        self.single_breaker.force_reset().await;
        self.batch_breaker.force_reset().await;
        self.runtime.reset_for_tests();
    }

    pub async fn embed_one(&self, ctx: &RequestContext, text: &str) -> LlmResult<Vec<f32>> {
        let input = [text.to_string()];
        let api_key = self.runtime.provider_api_key();
        let model = self.runtime.settings().embedding.model.clone();

        let mut vectors = with_retry(&self.retry, "embedding.single", ctx, || {
            self.single_breaker
                .execute(ctx, || self.fetch(ctx, &api_key, &model, &input))
        })
        .await?;

        vectors
            .pop()
            .ok_or_else(|| LlmError::EmbeddingCountMismatch {
                expected: 1,
                actual: 0,
            })
    }

    /// Embeds a batch, returning vectors in input order. Empty input
    /// returns an empty batch without touching the breaker or the network.
    pub async fn embed_many(
        &self,
        ctx: &RequestContext,
        texts: &[String],
    ) -> LlmResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let api_key = self.runtime.provider_api_key();
        let model = self.runtime.settings().embedding.model.clone();

        with_retry(&self.retry, "embedding.batch", ctx, || {
            self.batch_breaker
                .execute(ctx, || self.fetch(ctx, &api_key, &model, texts))
        })
        .await
    }

    /// One transport round: SDK first, raw HTTP on any SDK failure.
    /// Backends may answer out of order, so results are re-sorted by the
    /// reported index. A count mismatch is structural and not retried.
    async fn fetch(
        &self,
        ctx: &RequestContext,
        api_key: &str,
        model: &str,
        texts: &[String],
    ) -> LlmResult<Vec<Vec<f32>>> {
        let mut data = match self.sdk.embed(api_key, model, texts).await {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(
                    operation = "embedding",
                    correlation = %ctx.correlation_id,
                    transport = self.sdk.transport_name(),
                    error = %err,
                    kind = err.kind(),
                    "SDK embedding path failed, retrying over raw HTTP"
                );
                self.http.embed(api_key, model, texts).await?
            }
        };

        if data.len() != texts.len() {
            return Err(LlmError::EmbeddingCountMismatch {
                expected: texts.len(),
                actual: data.len(),
            });
        }

        data.sort_by_key(|e| e.index);
        Ok(data.into_iter().map(|e| e.vector).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::IndexedEmbedding;
    use crate::provider::mock::MockEmbeddingTransport;
    use config::Settings;
    use std::time::Duration;

    fn service(
        sdk: Arc<MockEmbeddingTransport>,
        http: Arc<MockEmbeddingTransport>,
        retries: u32,
    ) -> EmbeddingService {
        let runtime = Arc::new(RuntimeConfig::new(Settings::for_tests()));
        let cfg = BreakerConfig {
            volume_threshold: 100,
            ..BreakerConfig::default()
        };
        EmbeddingService::new(
            runtime,
            sdk,
            http,
            Arc::new(CircuitBreaker::new("embedding.single", cfg.clone())),
            Arc::new(CircuitBreaker::new("embedding.batch", cfg)),
            RetryPolicy {
                retries,
                initial_backoff: Duration::from_millis(1),
                jitter: false,
                ..RetryPolicy::default()
            },
        )
    }

    fn indexed(index: usize, value: f32) -> IndexedEmbedding {
        IndexedEmbedding {
            index,
            vector: vec![value; 3],
        }
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let sdk = Arc::new(MockEmbeddingTransport::new());
        let http = Arc::new(MockEmbeddingTransport::new());
        let svc = service(sdk.clone(), http.clone(), 2);

        let result = svc.embed_many(&RequestContext::new(), &[]).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(sdk.call_count(), 0);
        assert_eq!(http.call_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_resorted_by_index() {
        let sdk = Arc::new(MockEmbeddingTransport::new());
        sdk.push(Ok(vec![indexed(2, 0.3), indexed(0, 0.1), indexed(1, 0.2)]));
        let http = Arc::new(MockEmbeddingTransport::new());
        let svc = service(sdk, http, 0);

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = svc
            .embed_many(&RequestContext::new(), &texts)
            .await
            .unwrap();

        assert_eq!(vectors[0], vec![0.1; 3]);
        assert_eq!(vectors[1], vec![0.2; 3]);
        assert_eq!(vectors[2], vec![0.3; 3]);
    }

    #[tokio::test]
    async fn test_http_fallback_within_one_call() {
        let sdk = Arc::new(MockEmbeddingTransport::new());
        sdk.push(Err(LlmError::Network("sdk down".into())));
        let http = Arc::new(MockEmbeddingTransport::new());
        http.push(Ok(vec![indexed(0, 0.5)]));
        let svc = service(sdk.clone(), http.clone(), 0);

        let vector = svc.embed_one(&RequestContext::new(), "hello").await.unwrap();
        assert_eq!(vector, vec![0.5; 3]);
        assert_eq!(sdk.call_count(), 1);
        assert_eq!(http.call_count(), 1);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_not_retried() {
        let sdk = Arc::new(MockEmbeddingTransport::new());
        // Three retries available, but the structural error must stop the
        // loop after a single transport round.
        sdk.push(Ok(vec![indexed(0, 0.1)]));
        sdk.push(Ok(vec![indexed(0, 0.1)]));
        let http = Arc::new(MockEmbeddingTransport::new());
        let svc = service(sdk.clone(), http.clone(), 3);

        let texts = vec!["a".to_string(), "b".to_string()];
        let err = svc
            .embed_many(&RequestContext::new(), &texts)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            LlmError::EmbeddingCountMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(sdk.call_count(), 1);
        assert_eq!(http.call_count(), 0);
    }
}
