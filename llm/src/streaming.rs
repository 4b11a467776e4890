//! Streaming chat orchestrator. Delivers visible text deltas through a
//! caller-supplied callback while accumulating the full answer. A rate
//! limit from the primary provider flips the process-wide fallback-model
//! flag and retries the whole call once before handing off to the
//! secondary provider.

use crate::context::RequestContext;
use crate::error::LlmResult;
use crate::models;
use crate::provider::{ChatProvider, SecondaryProvider};
use crate::resilience::{BreakerConfig, CircuitBreaker, RetryPolicy, with_retry};
use crate::types::{ChatMessage, CompletionRequest};
use config::RuntimeConfig;
use futures::StreamExt;
use std::sync::Arc;

/// Chunk delivered to the streaming callback. Secondary-provider output
/// arrives as one labeled chunk so consumers can distinguish it from
/// incremental primary deltas and avoid double-rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Delta(String),
    SecondaryAnswer(String),
}

pub struct StreamingOrchestrator {
    runtime: Arc<RuntimeConfig>,
    provider: Arc<dyn ChatProvider>,
    secondary: Arc<dyn SecondaryProvider>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl StreamingOrchestrator {
    pub fn new(
        runtime: Arc<RuntimeConfig>,
        provider: Arc<dyn ChatProvider>,
        secondary: Arc<dyn SecondaryProvider>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            runtime,
            provider,
            secondary,
            breaker,
            retry,
        }
    }

    pub fn from_settings(runtime: Arc<RuntimeConfig>) -> Self {
        let settings = runtime.settings().clone();
        let breaker = Arc::new(CircuitBreaker::new(
            "chat.stream",
            BreakerConfig::from_settings(&settings.breaker, settings.breaker.call_timeout_ms),
        ));
        Self::new(
            runtime,
            Arc::new(crate::provider::openai::OpenAiChatProvider::new()),
            Arc::new(crate::provider::anthropic::AnthropicProvider::from_settings(&settings.llm)),
            breaker,
            RetryPolicy::with_retries(settings.llm.chat_retries),
        )
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub async fn reset_for_tests(&self) {
        self.breaker.force_reset().await;
        self.runtime.reset_for_tests();
    }

    fn build_request(&self, model: &str, messages: &[ChatMessage]) -> CompletionRequest {
        let settings = self.runtime.settings();
        let temperature = models::temperature_for(model, settings.llm.default_temperature);
        let (token_limit, token_param) =
            models::resolve_token_param(model, settings.llm.requested_max_tokens);
        CompletionRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature,
            token_param,
            token_limit,
            stream: true,
        }
    }

    /// Streams one answer, invoking `on_event` per visible delta. Returns
    /// the accumulated text, or `None` when primary and secondary both
    /// fail.
    pub async fn complete_streaming<F>(
        &self,
        ctx: &RequestContext,
        messages: &[ChatMessage],
        mut on_event: F,
    ) -> Option<String>
    where
        F: FnMut(StreamEvent) + Send,
    {
        let first = self.stream_once(ctx, messages, &mut on_event).await;
        let err = match first {
            Ok(text) => return Some(text),
            Err(err) => err,
        };

        // A rate limit flips the sticky flag and earns one full retry
        // against the fallback-configured model. If the flag was already
        // set, the fallback model itself is rate limited and we go
        // straight to the secondary provider.
        if err.is_rate_limit() && !self.runtime.fallback_model_active() {
            self.runtime.activate_fallback_model();
            tracing::warn!(
                operation = "chat.stream",
                correlation = %ctx.correlation_id,
                "Rate limited while streaming, retrying once with the fallback model"
            );
            match self.stream_once(ctx, messages, &mut on_event).await {
                Ok(text) => return Some(text),
                Err(retry_err) => {
                    tracing::warn!(
                        operation = "chat.stream",
                        correlation = %ctx.correlation_id,
                        error = %retry_err,
                        kind = retry_err.kind(),
                        "Fallback-model stream failed"
                    );
                }
            }
        } else {
            tracing::warn!(
                operation = "chat.stream",
                correlation = %ctx.correlation_id,
                error = %err,
                kind = err.kind(),
                "Primary stream failed, falling back to secondary"
            );
        }

        self.secondary_answer(ctx, messages, &mut on_event).await
    }

    /// One streamed attempt. Breaker and retry guard stream establishment;
    /// a mid-stream error after content has already been delivered ends
    /// the stream with the partial text rather than replaying deltas
    /// through a fallback path.
    async fn stream_once<F>(
        &self,
        ctx: &RequestContext,
        messages: &[ChatMessage],
        on_event: &mut F,
    ) -> LlmResult<String>
    where
        F: FnMut(StreamEvent) + Send,
    {
        let model = self.runtime.chat_model_id();
        let api_key = self.runtime.provider_api_key();
        let request = self.build_request(&model, messages);

        let mut stream = with_retry(&self.retry, "chat.stream", ctx, || {
            self.breaker
                .execute(ctx, || self.provider.complete_stream(&api_key, &request))
        })
        .await?;

        let mut accumulated = String::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(delta) => {
                    if !delta.content.is_empty() {
                        accumulated.push_str(&delta.content);
                        on_event(StreamEvent::Delta(delta.content));
                    }
                }
                Err(err) if accumulated.is_empty() => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        operation = "chat.stream",
                        correlation = %ctx.correlation_id,
                        model = %model,
                        error = %err,
                        delivered_chars = accumulated.len(),
                        "Stream aborted mid-answer, returning partial text"
                    );
                    break;
                }
            }
        }

        Ok(accumulated)
    }

    async fn secondary_answer<F>(
        &self,
        ctx: &RequestContext,
        messages: &[ChatMessage],
        on_event: &mut F,
    ) -> Option<String>
    where
        F: FnMut(StreamEvent) + Send,
    {
        match self.secondary.generate(messages).await {
            Ok(text) if !text.trim().is_empty() => {
                tracing::info!(
                    operation = "chat.stream",
                    correlation = %ctx.correlation_id,
                    provider = self.secondary.provider_tag(),
                    "Secondary provider answered streaming request"
                );
                on_event(StreamEvent::SecondaryAnswer(text.clone()));
                Some(text)
            }
            Ok(_) => {
                tracing::error!(
                    operation = "chat.stream",
                    correlation = %ctx.correlation_id,
                    "Secondary provider returned empty content"
                );
                None
            }
            Err(err) => {
                tracing::error!(
                    operation = "chat.stream",
                    correlation = %ctx.correlation_id,
                    error = %err,
                    kind = err.kind(),
                    "Secondary provider failed for streaming request"
                );
                None
            }
        }
    }
}
