//! Retry executor: repeats an async action on transient failure per a
//! configurable policy, surfacing the last error once attempts exhaust.

use crate::context::RequestContext;
use crate::error::{LlmError, LlmResult};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first; 0 means no retry.
    pub retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn with_retries(retries: u32) -> Self {
        Self {
            retries,
            ..Default::default()
        }
    }
}

/// Runs `action` up to `retries + 1` times. Non-retryable errors
/// short-circuit immediately; the last error is returned on exhaustion.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &'static str,
    ctx: &RequestContext,
    action: F,
) -> LlmResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = LlmResult<T>>,
{
    let mut backoff = policy.initial_backoff;
    let mut last_error = None;

    for attempt in 0..=policy.retries {
        match action().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let retryable = err.is_retryable();
                tracing::warn!(
                    operation = label,
                    correlation = %ctx.correlation_id,
                    attempt = attempt + 1,
                    max_attempts = policy.retries + 1,
                    error = %err,
                    kind = err.kind(),
                    "Attempt failed"
                );
                last_error = Some(err);

                if !retryable || attempt == policy.retries {
                    break;
                }

                let mut sleep_for = backoff;
                if policy.jitter {
                    let jitter = rand::random::<f64>() * 0.3 + 0.85;
                    sleep_for =
                        Duration::from_millis((sleep_for.as_millis() as f64 * jitter) as u64);
                }
                tokio::time::sleep(sleep_for).await;

                backoff = Duration::from_millis(
                    (backoff.as_millis() as f64 * policy.backoff_multiplier) as u64,
                )
                .min(policy.max_backoff);
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| LlmError::Config(format!("{label}: retry loop ran zero attempts"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicUsize::new(0);
        let ctx = RequestContext::new();

        let result = with_retry(&fast_policy(2), "test.op", &ctx, || async {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(LlmError::Network("flaky".into()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let counter = AtomicUsize::new(0);
        let ctx = RequestContext::new();

        let result: LlmResult<()> = with_retry(&fast_policy(1), "test.op", &ctx, || async {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Api {
                status: 503,
                message: format!("attempt {n}"),
            })
        })
        .await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
        match result.unwrap_err() {
            LlmError::Api { message, .. } => assert_eq!(message, "attempt 1"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_short_circuits() {
        let counter = AtomicUsize::new(0);
        let ctx = RequestContext::new();

        let result: LlmResult<()> = with_retry(&fast_policy(3), "test.op", &ctx, || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::EmbeddingCountMismatch {
                expected: 3,
                actual: 1,
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let counter = AtomicUsize::new(0);
        let ctx = RequestContext::new();

        let result: LlmResult<()> = with_retry(&fast_policy(0), "test.op", &ctx, || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(LlmError::Network("down".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
