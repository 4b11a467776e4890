//! OpenAI SDK paths: chat completions (blocking and streamed) and the
//! SDK-side embedding transport.

use super::{ChatProvider, EmbeddingTransport, IndexedEmbedding, ProviderStream, StreamDelta};
use crate::error::{LlmError, LlmResult};
use crate::models::TokenParam;
use crate::types::{ChatMessage, Choice, CompletionRequest, CompletionResult, Role, Usage};
use async_openai::error::OpenAIError;
use async_openai::types::embeddings::CreateEmbeddingRequestArgs;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, FinishReason,
};
use async_trait::async_trait;
use futures::StreamExt;

pub struct OpenAiChatProvider;

impl OpenAiChatProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for OpenAiChatProvider {
    fn default() -> Self {
        Self::new()
    }
}

fn client_for(api_key: &str) -> async_openai::Client<async_openai::config::OpenAIConfig> {
    let config = async_openai::config::OpenAIConfig::new().with_api_key(api_key);
    async_openai::Client::with_config(config)
}

fn map_openai_err(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.clone().unwrap_or_default();
            let code = format!("{:?}", api.code);
            if kind.contains("rate_limit") || code.contains("rate_limit") {
                LlmError::RateLimited(api.message)
            } else if kind.contains("server_error") || kind.contains("overloaded") {
                LlmError::Api {
                    status: 500,
                    message: api.message,
                }
            } else {
                LlmError::Api {
                    status: 400,
                    message: api.message,
                }
            }
        }
        OpenAIError::JSONDeserialize(e, _) => LlmError::Serialization(e.to_string()),
        other => LlmError::Network(other.to_string()),
    }
}

fn to_openai_messages(messages: &[ChatMessage]) -> LlmResult<Vec<ChatCompletionRequestMessage>> {
    messages
        .iter()
        .map(|m| {
            let converted: ChatCompletionRequestMessage = match m.role {
                Role::System => ChatCompletionRequestSystemMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(map_openai_err)?
                    .into(),
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(map_openai_err)?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(m.content.clone())
                    .build()
                    .map_err(map_openai_err)?
                    .into(),
            };
            Ok(converted)
        })
        .collect()
}

fn build_request(
    request: &CompletionRequest,
    stream: bool,
) -> LlmResult<async_openai::types::chat::CreateChatCompletionRequest> {
    let messages = to_openai_messages(&request.messages)?;

    let mut args = CreateChatCompletionRequestArgs::default();
    args.model(&request.model)
        .messages(messages)
        .temperature(request.temperature as f32)
        .stream(stream);

    // The limit field name differs by model family (resolved upstream).
    match request.token_param {
        TokenParam::MaxTokens => {
            args.max_tokens(request.token_limit);
        }
        TokenParam::MaxCompletionTokens => {
            args.max_completion_tokens(request.token_limit);
        }
    }

    args.build().map_err(map_openai_err)
}

fn finish_reason_str(reason: Option<FinishReason>) -> String {
    match reason {
        Some(FinishReason::Stop) => "stop",
        Some(FinishReason::Length) => "length",
        Some(FinishReason::ToolCalls) => "tool_calls",
        Some(FinishReason::ContentFilter) => "content_filter",
        Some(FinishReason::FunctionCall) => "function_call",
        None => "",
    }
    .to_string()
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    async fn complete(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> LlmResult<CompletionResult> {
        let client = client_for(api_key);
        let openai_request = build_request(request, false)?;

        let response = client
            .chat()
            .create(openai_request)
            .await
            .map_err(map_openai_err)?;

        Ok(CompletionResult {
            id: response.id,
            model_used: response.model,
            choices: response
                .choices
                .into_iter()
                .map(|c| Choice {
                    content: c.message.content.unwrap_or_default(),
                    finish_reason: finish_reason_str(c.finish_reason),
                })
                .collect(),
            usage: response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    async fn complete_stream(
        &self,
        api_key: &str,
        request: &CompletionRequest,
    ) -> LlmResult<ProviderStream> {
        let client = client_for(api_key);
        let openai_request = build_request(request, true)?;

        let stream = client
            .chat()
            .create_stream(openai_request)
            .await
            .map_err(map_openai_err)?;

        Ok(Box::pin(stream.map(|item| match item {
            Ok(chunk) => Ok(StreamDelta {
                content: chunk
                    .choices
                    .first()
                    .and_then(|c| c.delta.content.clone())
                    .unwrap_or_default(),
            }),
            Err(e) => Err(map_openai_err(e)),
        })))
    }
}

/// SDK-side embedding transport.
pub struct SdkEmbeddingTransport;

impl SdkEmbeddingTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SdkEmbeddingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingTransport for SdkEmbeddingTransport {
    async fn embed(
        &self,
        api_key: &str,
        model: &str,
        texts: &[String],
    ) -> LlmResult<Vec<IndexedEmbedding>> {
        let client = client_for(api_key);

        let request = CreateEmbeddingRequestArgs::default()
            .model(model)
            .input(texts.to_vec())
            .build()
            .map_err(map_openai_err)?;

        let response = client
            .embeddings()
            .create(request)
            .await
            .map_err(map_openai_err)?;

        Ok(response
            .data
            .into_iter()
            .map(|d| IndexedEmbedding {
                index: d.index as usize,
                vector: d.embedding,
            })
            .collect())
    }

    fn transport_name(&self) -> &'static str {
        "sdk"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(model: &str, param: TokenParam) -> CompletionRequest {
        CompletionRequest {
            model: model.into(),
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.7,
            token_param: param,
            token_limit: 1024,
            stream: false,
        }
    }

    #[test]
    fn test_build_request_both_token_params() {
        let req = build_request(&request("gpt-4o", TokenParam::MaxTokens), false).unwrap();
        assert_eq!(req.max_tokens, Some(1024));
        assert_eq!(req.max_completion_tokens, None);

        let req =
            build_request(&request("o1-mini", TokenParam::MaxCompletionTokens), false).unwrap();
        assert_eq!(req.max_completion_tokens, Some(1024));
        assert_eq!(req.max_tokens, None);
    }

    #[test]
    fn test_finish_reason_strings() {
        assert_eq!(finish_reason_str(Some(FinishReason::Stop)), "stop");
        assert_eq!(finish_reason_str(Some(FinishReason::Length)), "length");
        assert_eq!(finish_reason_str(None), "");
    }

    #[test]
    fn test_deserialize_errors_map_to_serialization() {
        let inner = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let mapped = map_openai_err(OpenAIError::JSONDeserialize(inner, "{".to_string()));
        assert!(matches!(mapped, LlmError::Serialization(_)));
    }

    #[test]
    fn test_embedding_request_builds() {
        let req = CreateEmbeddingRequestArgs::default()
            .model("text-embedding-3-small")
            .input(vec!["hello".to_string()])
            .build()
            .unwrap();
        assert_eq!(req.model, "text-embedding-3-small");
    }

    #[test]
    fn test_message_conversion_roles() {
        let msgs = to_openai_messages(&[
            ChatMessage::system("rules"),
            ChatMessage::user("question"),
            ChatMessage::assistant("answer"),
        ])
        .unwrap();
        assert_eq!(msgs.len(), 3);
    }
}
