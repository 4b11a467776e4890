//! Secondary provider: raw-HTTP Anthropic messages call.
//!
//! Only roles and content cross this boundary; system messages are lifted
//! into the top-level `system` field per the messages API.

use super::SecondaryProvider;
use crate::error::{LlmError, LlmResult};
use crate::types::{ChatMessage, Role};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
            max_tokens: 4096,
        }
    }

    pub fn from_settings(settings: &config::LlmSettings) -> Self {
        Self::new(
            settings.secondary_base_url.clone(),
            settings.secondary_api_key.clone(),
            settings.secondary_model.clone(),
        )
    }
}

#[async_trait]
impl SecondaryProvider for AnthropicProvider {
    async fn generate(&self, messages: &[ChatMessage]) -> LlmResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| LlmError::Config("Secondary provider API key not set".into()))?;

        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let turns: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": turns,
        });
        if !system.is_empty() {
            body["system"] = serde_json::json!(system.join("\n\n"));
        }

        let url = format!("{}/v1/messages", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimited(body));
            }
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;

        Ok(parsed
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect::<Vec<_>>()
            .join(""))
    }

    fn provider_tag(&self) -> &'static str {
        "anthropic"
    }
}
