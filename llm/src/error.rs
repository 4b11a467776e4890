use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Provider API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    #[error("Circuit breaker open: {breaker}")]
    BreakerOpen { breaker: &'static str },

    #[error("Completion had no usable content (finish_reason: {finish_reason})")]
    EmptyCompletion { finish_reason: String },

    #[error("Embedding count mismatch: expected {expected}, got {actual}")]
    EmbeddingCountMismatch { expected: usize, actual: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("All providers failed: {0}")]
    AllProvidersFailed(String),
}

impl LlmError {
    /// Transient failures worth retrying before falling to the secondary
    /// provider. Structural mismatches and configuration errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(_)
            | LlmError::Timeout(_)
            | LlmError::RateLimited(_)
            | LlmError::BreakerOpen { .. } => true,
            LlmError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited(_))
            || matches!(self, LlmError::Api { status: 429, .. })
    }

    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Api { .. } => "api",
            LlmError::RateLimited(_) => "rate_limited",
            LlmError::Network(_) => "network",
            LlmError::Timeout(_) => "timeout",
            LlmError::BreakerOpen { .. } => "breaker_open",
            LlmError::EmptyCompletion { .. } => "empty_completion",
            LlmError::EmbeddingCountMismatch { .. } => "embedding_count_mismatch",
            LlmError::Serialization(_) => "serialization",
            LlmError::Config(_) => "config",
            LlmError::AllProvidersFailed(_) => "all_providers_failed",
        }
    }
}

pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(LlmError::Network("reset".into()).is_retryable());
        assert!(LlmError::Timeout(30_000).is_retryable());
        assert!(LlmError::RateLimited("429".into()).is_retryable());
        assert!(LlmError::BreakerOpen { breaker: "chat" }.is_retryable());
        assert!(
            LlmError::Api {
                status: 503,
                message: "unavailable".into()
            }
            .is_retryable()
        );

        assert!(
            !LlmError::Api {
                status: 400,
                message: "bad request".into()
            }
            .is_retryable()
        );
        assert!(
            !LlmError::EmbeddingCountMismatch {
                expected: 3,
                actual: 2
            }
            .is_retryable()
        );
        assert!(!LlmError::Config("missing key".into()).is_retryable());
    }

    #[test]
    fn test_rate_limit_detection() {
        assert!(LlmError::RateLimited("slow down".into()).is_rate_limit());
        assert!(
            LlmError::Api {
                status: 429,
                message: "too many requests".into()
            }
            .is_rate_limit()
        );
        assert!(!LlmError::Timeout(1000).is_rate_limit());
    }
}
