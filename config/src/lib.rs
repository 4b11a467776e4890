//! # Configuration System
//!
//! Centralized configuration for the provider resilience core.
//!
//! This crate provides:
//! - Startup settings loaded from environment variables (12-factor)
//! - Validation with hardcoded fallbacks for invalid numeric input
//! - The runtime configuration service: admin overrides resolved at call
//!   time and the sticky fallback-model flag

pub mod error;
pub mod runtime;
pub mod settings;

pub use error::ConfigError;
pub use runtime::RuntimeConfig;
pub use settings::{BreakerSettings, EmbeddingSettings, LlmSettings, Settings, VectorSettings};
