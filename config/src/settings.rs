//! Startup settings, read from the environment once at process start.
//!
//! Numeric values are validated (non-negative integers, positive timeouts);
//! invalid input falls back to the hardcoded default with a warning rather
//! than aborting startup. Only a missing primary-provider credential is
//! fatal.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::env;

fn env_string(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_u32(name: &str, default: u32) -> u32 {
    match env::var(name) {
        Ok(raw) => match raw.parse::<u32>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    var = name,
                    value = %raw,
                    default,
                    "Invalid integer in environment, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

fn env_f64(name: &str, default: f64) -> f64 {
    match env::var(name) {
        Ok(raw) => match raw.parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                tracing::warn!(
                    var = name,
                    value = %raw,
                    default,
                    "Invalid number in environment, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// Positive-millisecond timeout; zero or unparseable input falls back.
fn env_timeout_ms(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(v) if v > 0 => v,
            _ => {
                tracing::warn!(
                    var = name,
                    value = %raw,
                    default,
                    "Timeout must be a positive integer, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

/// Chat and secondary-provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// Primary provider API key. Required at startup; the admin override
    /// resolved through [`crate::RuntimeConfig`] takes precedence per call.
    pub api_key: String,
    /// Primary chat model id.
    pub primary_model: String,
    /// Model used once the sticky fallback flag is active.
    pub fallback_model: String,
    /// Default sampling temperature for unrestricted model families.
    pub default_temperature: f64,
    /// Requested output-token ceiling, clamped per model at call time.
    pub requested_max_tokens: u32,
    /// Retry count for chat completions.
    pub chat_retries: u32,
    /// Secondary provider credential and model (role+content fallback path).
    pub secondary_api_key: Option<String>,
    pub secondary_model: String,
    pub secondary_base_url: String,
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub model: String,
    /// Configured vector dimensionality. A configuration invariant, not
    /// validated per call.
    pub dimension: usize,
    pub retries: u32,
    /// Base URL for the raw-HTTP fallback path.
    pub base_url: String,
}

/// Circuit breaker thresholds, shared defaults across operation kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    pub error_threshold_percentage: f64,
    pub volume_threshold: u64,
    pub call_timeout_ms: u64,
    /// Batch embedding carries a longer per-call deadline than single.
    pub batch_call_timeout_ms: u64,
    pub reset_timeout_ms: u64,
}

/// Vector backend selection and per-backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSettings {
    pub backend: String,
    pub namespace_prefix: String,
    pub qdrant_url: String,
    pub qdrant_api_key: Option<String>,
    pub pinecone_api_key: Option<String>,
    pub pinecone_index: String,
    pub pg_url: Option<String>,
    pub pg_schema: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub breaker: BreakerSettings,
    pub vector: VectorSettings,
}

impl Settings {
    /// Loads settings from the environment.
    ///
    /// Fails only when the primary provider credential is absent; every
    /// other invalid value degrades to its hardcoded default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = env::var("LLM_API_KEY")
            .map_err(|_| ConfigError::MissingCredential("LLM_API_KEY".into()))?;

        Ok(Self {
            llm: LlmSettings {
                api_key,
                primary_model: env_string("LLM_PRIMARY_MODEL", "gpt-4o"),
                fallback_model: env_string("LLM_FALLBACK_MODEL", "gpt-4o-mini"),
                default_temperature: env_f64("LLM_TEMPERATURE", 0.7),
                requested_max_tokens: env_u32("LLM_MAX_TOKENS", 4096),
                chat_retries: env_u32("LLM_CHAT_RETRIES", 1),
                secondary_api_key: env::var("LLM_SECONDARY_API_KEY").ok(),
                secondary_model: env_string("LLM_SECONDARY_MODEL", "claude-3-5-sonnet-latest"),
                secondary_base_url: env_string("LLM_SECONDARY_URL", "https://api.anthropic.com"),
            },
            embedding: EmbeddingSettings {
                model: env_string("EMB_MODEL", "text-embedding-3-small"),
                dimension: env_u32("EMB_DIMENSION", 1536) as usize,
                retries: env_u32("EMB_RETRIES", 2),
                base_url: env_string("EMB_BASE_URL", "https://api.openai.com"),
            },
            breaker: BreakerSettings {
                error_threshold_percentage: env_f64("CB_ERROR_THRESHOLD", 50.0),
                volume_threshold: u64::from(env_u32("CB_VOLUME_THRESHOLD", 5)),
                call_timeout_ms: env_timeout_ms("CB_CALL_TIMEOUT_MS", 30_000),
                batch_call_timeout_ms: env_timeout_ms("CB_BATCH_CALL_TIMEOUT_MS", 120_000),
                reset_timeout_ms: env_timeout_ms("CB_RESET_TIMEOUT_MS", 30_000),
            },
            vector: VectorSettings {
                backend: env_string("VEC_BACKEND", "memory"),
                namespace_prefix: env_string("VEC_NAMESPACE_PREFIX", "rag"),
                qdrant_url: env_string("QD_URL", "http://localhost:6334"),
                qdrant_api_key: env::var("QD_API_KEY").ok(),
                pinecone_api_key: env::var("PINECONE_API_KEY").ok(),
                pinecone_index: env_string("PINECONE_INDEX", "rag-chunks"),
                pg_url: env::var("PG_URL").ok(),
                pg_schema: env_string("PG_SCHEMA", "public"),
            },
        })
    }

    /// Settings suitable for tests: no environment access, no credentials
    /// that reach a real provider.
    pub fn for_tests() -> Self {
        Self {
            llm: LlmSettings {
                api_key: "sk-test".into(),
                primary_model: "gpt-4o".into(),
                fallback_model: "gpt-4o-mini".into(),
                default_temperature: 0.7,
                requested_max_tokens: 4096,
                chat_retries: 1,
                secondary_api_key: Some("sk-ant-test".into()),
                secondary_model: "claude-3-5-sonnet-latest".into(),
                secondary_base_url: "http://localhost:0".into(),
            },
            embedding: EmbeddingSettings {
                model: "text-embedding-3-small".into(),
                dimension: 1536,
                retries: 2,
                base_url: "http://localhost:0".into(),
            },
            breaker: BreakerSettings {
                error_threshold_percentage: 50.0,
                volume_threshold: 5,
                call_timeout_ms: 30_000,
                batch_call_timeout_ms: 120_000,
                reset_timeout_ms: 30_000,
            },
            vector: VectorSettings {
                backend: "memory".into(),
                namespace_prefix: "rag".into(),
                qdrant_url: "http://localhost:6334".into(),
                qdrant_api_key: None,
                pinecone_api_key: None,
                pinecone_index: "rag-chunks".into(),
                pg_url: None,
                pg_schema: "public".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_u32_invalid_falls_back() {
        // SAFETY: tests in this module do not run concurrently against the
        // same variable name.
        unsafe { env::set_var("TEST_CFG_U32", "not-a-number") };
        assert_eq!(env_u32("TEST_CFG_U32", 7), 7);
        unsafe { env::set_var("TEST_CFG_U32", "12") };
        assert_eq!(env_u32("TEST_CFG_U32", 7), 12);
        unsafe { env::remove_var("TEST_CFG_U32") };
    }

    #[test]
    fn test_env_timeout_rejects_zero() {
        unsafe { env::set_var("TEST_CFG_TIMEOUT", "0") };
        assert_eq!(env_timeout_ms("TEST_CFG_TIMEOUT", 500), 500);
        unsafe { env::set_var("TEST_CFG_TIMEOUT", "2500") };
        assert_eq!(env_timeout_ms("TEST_CFG_TIMEOUT", 500), 2500);
        unsafe { env::remove_var("TEST_CFG_TIMEOUT") };
    }

    #[test]
    fn test_missing_unset_uses_default() {
        assert_eq!(env_string("TEST_CFG_ABSENT", "fallback"), "fallback");
        assert_eq!(env_f64("TEST_CFG_ABSENT_F", 1.5), 1.5);
    }

    #[test]
    fn test_for_tests_defaults() {
        let s = Settings::for_tests();
        assert_eq!(s.llm.chat_retries, 1);
        assert_eq!(s.embedding.retries, 2);
        assert_eq!(s.embedding.dimension, 1536);
    }
}
