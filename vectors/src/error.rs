use thiserror::Error;

pub type VectorResult<T> = Result<T, VectorError>;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("Connection failed to {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal backend error: {0}")]
    Internal(String),
}

impl VectorError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            VectorError::ConnectionFailed(_)
                | VectorError::RateLimited(_)
                | VectorError::Internal(_)
        )
    }
}

impl From<serde_json::Error> for VectorError {
    fn from(e: serde_json::Error) -> Self {
        VectorError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(VectorError::ConnectionFailed("host".into()).is_retryable());
        assert!(VectorError::RateLimited("quota".into()).is_retryable());

        assert!(!VectorError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!VectorError::InvalidFilter("$regex".into()).is_retryable());
        assert!(
            !VectorError::DimensionMismatch {
                expected: 1536,
                actual: 3
            }
            .is_retryable()
        );
    }
}
