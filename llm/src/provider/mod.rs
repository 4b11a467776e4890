//! Provider seams: the traits the orchestrators call through, plus the
//! real OpenAI/Anthropic implementations and in-tree mocks.

pub mod anthropic;
pub mod http;
pub mod mock;
pub mod openai;

use crate::error::LlmResult;
use crate::types::{ChatMessage, CompletionRequest, CompletionResult};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// One incremental text delta from a streamed completion.
#[derive(Debug, Clone)]
pub struct StreamDelta {
    pub content: String,
}

pub type ProviderStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// Primary chat provider. The credential is passed per call because the
/// admin-configured key is re-resolved on every request.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> LlmResult<CompletionResult>;

    async fn complete_stream(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> LlmResult<ProviderStream>;
}

/// Secondary provider used when the primary path is exhausted. Receives
/// role + content only; its output is synthesized into a
/// [`CompletionResult`] by the orchestrator.
#[async_trait]
pub trait SecondaryProvider: Send + Sync {
    async fn generate(&self, messages: &[ChatMessage]) -> LlmResult<String>;

    /// Tag used in synthesized response ids and log fields.
    fn provider_tag(&self) -> &'static str;
}

/// An embedding vector paired with the index the backend reported for it.
#[derive(Debug, Clone)]
pub struct IndexedEmbedding {
    pub index: usize,
    pub vector: Vec<f32>,
}

/// One way of reaching the embedding backend. The service tries the SDK
/// transport first and falls back to the raw-HTTP transport in-call.
#[async_trait]
pub trait EmbeddingTransport: Send + Sync {
    async fn embed(
        &self,
        api_key: &str,
        model: &str,
        texts: &[String],
    ) -> LlmResult<Vec<IndexedEmbedding>>;

    /// Short name for log fields ("sdk" / "http").
    fn transport_name(&self) -> &'static str;
}
