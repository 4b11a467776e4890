//! Resilience layer between the RAG pipeline and the LLM providers.
//!
//! Chat and streaming orchestrators, the embedding service, and the
//! breaker/retry primitives they compose. Provider-facing entry points
//! degrade internally (retry, then secondary provider, then a null
//! result) so one flaky upstream call never reaches the pipeline as a
//! panic or stray error.

pub mod chat;
pub mod context;
pub mod embedding;
pub mod error;
pub mod models;
pub mod pricing;
pub mod provider;
pub mod resilience;
pub mod streaming;
pub mod types;

pub use chat::ChatOrchestrator;
pub use context::RequestContext;
pub use embedding::EmbeddingService;
pub use error::{LlmError, LlmResult};
pub use resilience::{BreakerConfig, CircuitBreaker, CircuitState, RetryPolicy, with_retry};
pub use streaming::{StreamEvent, StreamingOrchestrator};
pub use types::{ChatMessage, Choice, CompletionRequest, CompletionResult, Role, Usage};
