#![cfg(feature = "pinecone")]

//! Pinecone backend over raw HTTP. Namespaces are native, and the
//! filter grammar normalizes to Pinecone's Mongo-style dialect without
//! further translation.

use crate::VectorBackend;
use crate::error::{VectorError, VectorResult};
use crate::filter::Filter;
use crate::types::{
    DeleteOutcome, NamespaceStats, QueryMatch, QueryRequest, UpsertOutcome, VectorRecord,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct PineconeBackend {
    client: Client,
    host: String,
    api_key: String,
    dimension: usize,
}

#[derive(Debug, Serialize)]
struct UpsertBody {
    vectors: Vec<PineconeVector>,
    namespace: String,
}

#[derive(Debug, Serialize)]
struct PineconeVector {
    id: String,
    values: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct QueryBody {
    vector: Vec<f32>,
    #[serde(rename = "topK")]
    top_k: usize,
    namespace: String,
    #[serde(rename = "includeMetadata")]
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<PineconeMatch>,
}

#[derive(Debug, Deserialize)]
struct PineconeMatch {
    id: String,
    score: f32,
    metadata: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
struct DeleteBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<serde_json::Value>,
    #[serde(rename = "deleteAll", skip_serializing_if = "Option::is_none")]
    delete_all: Option<bool>,
    namespace: String,
}

#[derive(Debug, Deserialize)]
struct IndexStatsResponse {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceSummary>,
    #[serde(default)]
    dimension: usize,
}

#[derive(Debug, Deserialize)]
struct NamespaceSummary {
    #[serde(rename = "vectorCount", default)]
    vector_count: usize,
}

#[derive(Debug, Deserialize)]
struct DescribeIndexResponse {
    host: String,
}

impl PineconeBackend {
    /// Resolves the index host through the control-plane API.
    pub async fn connect(
        api_key: impl Into<String>,
        index_name: &str,
        dimension: usize,
    ) -> VectorResult<Self> {
        let api_key = api_key.into();
        let client = Client::new();

        let controller_url = format!("https://api.pinecone.io/indexes/{index_name}");
        let resp = client
            .get(&controller_url)
            .header("Api-Key", &api_key)
            .send()
            .await
            .map_err(|e| VectorError::ConnectionFailed(format!("Pinecone: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(VectorError::AuthenticationFailed(format!(
                "Pinecone API error {status}: {body}"
            )));
        }

        let index: DescribeIndexResponse = resp
            .json()
            .await
            .map_err(|e| VectorError::Serialization(e.to_string()))?;

        Ok(Self::with_host(
            format!("https://{}", index.host),
            api_key,
            dimension,
        ))
    }

    /// Builds against a known data-plane host. Tests point this at a
    /// local mock server.
    pub fn with_host(host: impl Into<String>, api_key: impl Into<String>, dimension: usize) -> Self {
        Self {
            client: Client::new(),
            host: host.into(),
            api_key: api_key.into(),
            dimension,
        }
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> VectorResult<reqwest::Response> {
        let url = format!("{}/{path}", self.host);
        let resp = self
            .client
            .post(&url)
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| VectorError::ConnectionFailed(format!("Pinecone: {e}")))?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let text = resp.text().await.unwrap_or_default();
        Err(match status.as_u16() {
            401 | 403 => VectorError::AuthenticationFailed(text),
            429 => VectorError::RateLimited(text),
            _ => VectorError::Internal(format!("Pinecone {status}: {text}")),
        })
    }

    async fn index_stats(&self) -> VectorResult<IndexStatsResponse> {
        let resp = self
            .post("describe_index_stats", &serde_json::json!({}))
            .await?;
        resp.json()
            .await
            .map_err(|e| VectorError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl VectorBackend for PineconeBackend {
    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> VectorResult<UpsertOutcome> {
        let count = records.len();
        let body = UpsertBody {
            vectors: records
                .into_iter()
                .map(|r| PineconeVector {
                    id: r.id,
                    values: r.vector,
                    metadata: if r.metadata.is_empty() {
                        None
                    } else {
                        Some(r.metadata)
                    },
                })
                .collect(),
            namespace: namespace.to_string(),
        };

        self.post("vectors/upsert", &body).await?;
        Ok(UpsertOutcome::new(count))
    }

    async fn query(&self, request: &QueryRequest) -> VectorResult<Vec<QueryMatch>> {
        let body = QueryBody {
            vector: request.vector.clone(),
            top_k: request.top_k,
            namespace: request.namespace.clone(),
            include_metadata: request.include_metadata,
            filter: request.filter.as_ref().and_then(Filter::to_pinecone_filter),
        };

        let resp = self.post("query", &body).await?;
        let parsed: QueryResponse = resp
            .json()
            .await
            .map_err(|e| VectorError::Serialization(e.to_string()))?;

        Ok(parsed
            .matches
            .into_iter()
            .map(|m| QueryMatch {
                id: m.id,
                score: m.score,
                metadata: m.metadata.unwrap_or_default(),
            })
            .collect())
    }

    async fn delete_by_ids(&self, namespace: &str, ids: &[String]) -> VectorResult<DeleteOutcome> {
        let body = DeleteBody {
            ids: Some(ids.to_vec()),
            filter: None,
            delete_all: None,
            namespace: namespace.to_string(),
        };
        self.post("vectors/delete", &body).await?;
        Ok(DeleteOutcome::new(ids.len()))
    }

    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &Filter,
    ) -> VectorResult<DeleteOutcome> {
        let Some(pinecone_filter) = filter.to_pinecone_filter() else {
            return Err(VectorError::InvalidFilter(
                "empty filter would delete every record; use purge_namespace".into(),
            ));
        };
        let body = DeleteBody {
            ids: None,
            filter: Some(pinecone_filter),
            delete_all: None,
            namespace: namespace.to_string(),
        };
        self.post("vectors/delete", &body).await?;
        // The API does not report how many vectors the filter matched.
        Ok(DeleteOutcome::new(0))
    }

    async fn purge_namespace(&self, namespace: &str) -> VectorResult<()> {
        let body = DeleteBody {
            ids: None,
            filter: None,
            delete_all: Some(true),
            namespace: namespace.to_string(),
        };
        self.post("vectors/delete", &body).await?;
        Ok(())
    }

    async fn list_namespaces(&self) -> VectorResult<Vec<String>> {
        let stats = self.index_stats().await?;
        let mut names: Vec<String> = stats.namespaces.into_keys().collect();
        names.sort();
        Ok(names)
    }

    async fn stats(&self, namespace: &str) -> VectorResult<NamespaceStats> {
        let stats = self.index_stats().await?;
        let vector_count = stats
            .namespaces
            .get(namespace)
            .map_or(0, |ns| ns.vector_count);
        let dimension = if stats.dimension > 0 {
            stats.dimension
        } else {
            self.dimension
        };
        Ok(NamespaceStats {
            vector_count,
            dimension,
        })
    }

    fn backend_name(&self) -> &'static str {
        "pinecone"
    }
}
