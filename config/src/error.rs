use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required credential: {0}")]
    MissingCredential(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::MissingCredential("LLM_API_KEY".into());
        assert!(err.to_string().contains("LLM_API_KEY"));
    }
}
