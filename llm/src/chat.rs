//! Chat completion orchestrator: breaker + retry around the primary
//! provider, empty-content detection, cost estimation, and secondary
//! provider fallback. Degrades to `None` instead of throwing; only
//! [`ChatOrchestrator::complete_text`] errors outward.

use crate::context::RequestContext;
use crate::error::{LlmError, LlmResult};
use crate::models;
use crate::pricing;
use crate::provider::{ChatProvider, SecondaryProvider};
use crate::resilience::{BreakerConfig, CircuitBreaker, RetryPolicy, with_retry};
use crate::types::{ChatMessage, Choice, CompletionRequest, CompletionResult, Usage};
use config::RuntimeConfig;
use std::sync::Arc;
use uuid::Uuid;

pub struct ChatOrchestrator {
    runtime: Arc<RuntimeConfig>,
    provider: Arc<dyn ChatProvider>,
    secondary: Arc<dyn SecondaryProvider>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

/// Treats "successful but useless" responses as failures: no choices at
/// all, or a first choice whose content is empty/whitespace and was cut
/// off by the length limit.
fn empty_completion_reason(result: &CompletionResult) -> Option<String> {
    match result.choices.first() {
        None => Some("no_choices".to_string()),
        Some(c) if c.content.trim().is_empty() && c.finish_reason == "length" => {
            Some(c.finish_reason.clone())
        }
        _ => None,
    }
}

/// Token usage approximated by word count; advisory only, used when the
/// secondary provider reports no usage.
fn approximate_usage(messages: &[ChatMessage], completion: &str) -> Usage {
    let prompt_tokens = messages
        .iter()
        .map(|m| m.content.split_whitespace().count())
        .sum::<usize>() as u32;
    let completion_tokens = completion.split_whitespace().count() as u32;
    Usage {
        prompt_tokens,
        completion_tokens,
        total_tokens: prompt_tokens + completion_tokens,
    }
}

impl ChatOrchestrator {
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

    /// Wires the real providers from startup settings.
    pub fn from_settings(runtime: Arc<RuntimeConfig>) -> Self {
        let settings = runtime.settings().clone();
        let breaker = Arc::new(CircuitBreaker::new(
            "chat.completion",
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

    /// Test-only reset: force-closes the breaker and clears runtime state.
    pub async fn reset_for_tests(&self) {
        self.breaker.force_reset().await;
        self.runtime.reset_for_tests();
    }

    /// Builds the per-call request with resolved temperature and token
    /// limit. Model and credential precedence live in [`RuntimeConfig`].
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
            stream: false,
        }
    }

    /// One non-streamed answer. Every failure mode degrades: retries per
    /// policy, then the secondary provider, then `None`.
    pub async fn complete(
        &self,
        ctx: &RequestContext,
        messages: &[ChatMessage],
    ) -> Option<CompletionResult> {
        match self.try_primary(ctx, messages).await {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::warn!(
                    operation = "chat.completion",
                    correlation = %ctx.correlation_id,
                    error = %err,
                    kind = err.kind(),
                    "Primary chat provider exhausted, falling back to secondary"
                );
                self.secondary_completion(ctx, messages).await
            }
        }
    }

    /// Like [`Self::complete`] but errors when both providers fail, for
    /// callers that cannot handle `None`.
    pub async fn complete_text(
        &self,
        ctx: &RequestContext,
        messages: &[ChatMessage],
    ) -> LlmResult<String> {
        match self.complete(ctx, messages).await {
            Some(result) => result
                .first_content()
                .map(str::to_string)
                .ok_or_else(|| LlmError::AllProvidersFailed("completion had no content".into())),
            None => Err(LlmError::AllProvidersFailed(
                "primary and secondary providers both failed".into(),
            )),
        }
    }

    async fn try_primary(
        &self,
        ctx: &RequestContext,
        messages: &[ChatMessage],
    ) -> LlmResult<CompletionResult> {
        let model = self.runtime.chat_model_id();
        let api_key = self.runtime.provider_api_key();
        let request = self.build_request(&model, messages);

        let result = with_retry(&self.retry, "chat.completion", ctx, || {
            self.breaker
                .execute(ctx, || self.provider.complete(&api_key, &request))
        })
        .await?;

        if let Some(reason) = empty_completion_reason(&result) {
            return Err(LlmError::EmptyCompletion {
                finish_reason: reason,
            });
        }

        if let Some(usage) = &result.usage {
            let cost = pricing::estimate_cost(&result.model_used, usage);
            tracing::info!(
                operation = "chat.completion",
                correlation = %ctx.correlation_id,
                model = %result.model_used,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                cost_usd = cost,
                "Chat completion usage"
            );
        }

        Ok(result)
    }

    async fn secondary_completion(
        &self,
        ctx: &RequestContext,
        messages: &[ChatMessage],
    ) -> Option<CompletionResult> {
        match self.secondary.generate(messages).await {
            Ok(text) if !text.trim().is_empty() => {
                let tag = self.secondary.provider_tag();
                tracing::info!(
                    operation = "chat.completion",
                    correlation = %ctx.correlation_id,
                    provider = tag,
                    "Secondary provider answered"
                );
                Some(CompletionResult {
                    id: format!("{tag}-{}", Uuid::new_v4()),
                    model_used: tag.to_string(),
                    choices: vec![Choice {
                        content: text.clone(),
                        finish_reason: "stop".to_string(),
                    }],
                    usage: Some(approximate_usage(messages, &text)),
                })
            }
            Ok(_) => {
                tracing::error!(
                    operation = "chat.completion",
                    correlation = %ctx.correlation_id,
                    "Secondary provider returned empty content"
                );
                None
            }
            Err(err) => {
                tracing::error!(
                    operation = "chat.completion",
                    correlation = %ctx.correlation_id,
                    error = %err,
                    kind = err.kind(),
                    "Secondary provider failed"
                );
                None
            }
        }
    }
}
