//! Raw-HTTP embedding transport, the in-call fallback when the SDK path
//! fails. Base URL is configurable so tests can point it at a local mock.

use super::{EmbeddingTransport, IndexedEmbedding};
use crate::error::{LlmError, LlmResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

pub struct HttpEmbeddingTransport {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbeddingTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl EmbeddingTransport for HttpEmbeddingTransport {
    async fn embed(
        &self,
        api_key: &str,
        model: &str,
        texts: &[String],
    ) -> LlmResult<Vec<IndexedEmbedding>> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&serde_json::json!({
                "model": model,
                "input": texts,
            }))
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

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;

        Ok(parsed
            .data
            .into_iter()
            .map(|d| IndexedEmbedding {
                index: d.index,
                vector: d.embedding,
            })
            .collect())
    }

    fn transport_name(&self) -> &'static str {
        "http"
    }
}
