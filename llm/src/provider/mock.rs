//! Scripted provider mocks used by orchestrator tests.

use super::{
    ChatProvider, EmbeddingTransport, IndexedEmbedding, ProviderStream, SecondaryProvider,
    StreamDelta,
};
use crate::error::{LlmError, LlmResult};
use crate::types::{ChatMessage, Choice, CompletionRequest, CompletionResult, Usage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Builds a plain successful result for scripting.
pub fn completion(content: &str, finish_reason: &str) -> CompletionResult {
    CompletionResult {
        id: "chatcmpl-mock".into(),
        model_used: "gpt-4o".into(),
        choices: vec![Choice {
            content: content.into(),
            finish_reason: finish_reason.into(),
        }],
        usage: Some(Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
    }
}

#[derive(Default)]
pub struct MockChatProvider {
    script: Mutex<VecDeque<LlmResult<CompletionResult>>>,
    stream_script: Mutex<VecDeque<LlmResult<Vec<StreamDelta>>>>,
    pub calls: AtomicUsize,
    pub stream_calls: AtomicUsize,
    pub models_seen: Mutex<Vec<String>>,
}

impl MockChatProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: LlmResult<CompletionResult>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn push_stream(&self, outcome: LlmResult<Vec<StreamDelta>>) {
        self.stream_script.lock().unwrap().push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn stream_call_count(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn seen_models(&self) -> Vec<String> {
        self.models_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete(
        &self,
        _api_key: &str,
        request: &CompletionRequest,
    ) -> LlmResult<CompletionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.models_seen.lock().unwrap().push(request.model.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Network("mock chat script exhausted".into())))
    }

    async fn complete_stream(
        &self,
        _api_key: &str,
        request: &CompletionRequest,
    ) -> LlmResult<ProviderStream> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        self.models_seen.lock().unwrap().push(request.model.clone());
        let outcome = self
            .stream_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Network("mock stream script exhausted".into())));
        let deltas = outcome?;
        Ok(Box::pin(futures::stream::iter(
            deltas.into_iter().map(Ok),
        )))
    }
}

#[derive(Default)]
pub struct MockSecondaryProvider {
    script: Mutex<VecDeque<LlmResult<String>>>,
    pub calls: AtomicUsize,
}

impl MockSecondaryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_with(text: &str) -> Self {
        let mock = Self::default();
        mock.push(Ok(text.to_string()));
        mock
    }

    pub fn push(&self, outcome: LlmResult<String>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondaryProvider for MockSecondaryProvider {
    async fn generate(&self, _messages: &[ChatMessage]) -> LlmResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Network("mock secondary script exhausted".into())))
    }

    fn provider_tag(&self) -> &'static str {
        "mock-secondary"
    }
}

#[derive(Default)]
pub struct MockEmbeddingTransport {
    script: Mutex<VecDeque<LlmResult<Vec<IndexedEmbedding>>>>,
    pub calls: AtomicUsize,
}

impl MockEmbeddingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, outcome: LlmResult<Vec<IndexedEmbedding>>) {
        self.script.lock().unwrap().push_back(outcome);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingTransport for MockEmbeddingTransport {
    async fn embed(
        &self,
        _api_key: &str,
        _model: &str,
        _texts: &[String],
    ) -> LlmResult<Vec<IndexedEmbedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Network("mock embedding script exhausted".into())))
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}
