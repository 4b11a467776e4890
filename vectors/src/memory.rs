//! In-process reference backend. Exact cosine similarity over a hash
//! map, full filter evaluation through [`Filter::matches`]. Used by
//! tests and as the zero-dependency default configuration.

use crate::error::{VectorError, VectorResult};
use crate::filter::Filter;
use crate::types::{DeleteOutcome, NamespaceStats, QueryMatch, QueryRequest, UpsertOutcome, VectorRecord};
use crate::VectorBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub struct MemoryBackend {
    dimension: usize,
    namespaces: RwLock<HashMap<String, HashMap<String, VectorRecord>>>,
}

impl MemoryBackend {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            namespaces: RwLock::new(HashMap::new()),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorBackend for MemoryBackend {
    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> VectorResult<UpsertOutcome> {
        for record in &records {
            if record.vector.len() != self.dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: self.dimension,
                    actual: record.vector.len(),
                });
            }
        }

        let mut namespaces = self.namespaces.write().await;
        let ns = namespaces.entry(namespace.to_string()).or_default();
        let count = records.len();
        for record in records {
            ns.insert(record.id.clone(), record);
        }
        Ok(UpsertOutcome::new(count))
    }

    async fn query(&self, request: &QueryRequest) -> VectorResult<Vec<QueryMatch>> {
        if request.vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: request.vector.len(),
            });
        }

        let namespaces = self.namespaces.read().await;
        let Some(ns) = namespaces.get(&request.namespace) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<QueryMatch> = ns
            .values()
            .filter(|record| {
                request
                    .filter
                    .as_ref()
                    .is_none_or(|f| f.matches(&record.metadata))
            })
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: cosine_similarity(&request.vector, &record.vector),
                metadata: if request.include_metadata {
                    record.metadata.clone()
                } else {
                    HashMap::new()
                },
            })
            .collect();

        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(request.top_k);
        Ok(matches)
    }

    async fn delete_by_ids(&self, namespace: &str, ids: &[String]) -> VectorResult<DeleteOutcome> {
        let mut namespaces = self.namespaces.write().await;
        let Some(ns) = namespaces.get_mut(namespace) else {
            return Ok(DeleteOutcome::new(0));
        };
        let mut deleted = 0;
        for id in ids {
            if ns.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(DeleteOutcome::new(deleted))
    }

    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &Filter,
    ) -> VectorResult<DeleteOutcome> {
        if filter.is_empty() {
            return Err(VectorError::InvalidFilter(
                "empty filter would delete every record; use purge_namespace".into(),
            ));
        }
        let mut namespaces = self.namespaces.write().await;
        let Some(ns) = namespaces.get_mut(namespace) else {
            return Ok(DeleteOutcome::new(0));
        };
        let before = ns.len();
        ns.retain(|_, record| !filter.matches(&record.metadata));
        Ok(DeleteOutcome::new(before - ns.len()))
    }

    async fn purge_namespace(&self, namespace: &str) -> VectorResult<()> {
        self.namespaces.write().await.remove(namespace);
        Ok(())
    }

    async fn list_namespaces(&self) -> VectorResult<Vec<String>> {
        let mut names: Vec<String> = self.namespaces.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn stats(&self, namespace: &str) -> VectorResult<NamespaceStats> {
        let namespaces = self.namespaces.read().await;
        let count = namespaces.get(namespace).map_or(0, HashMap::len);
        Ok(NamespaceStats {
            vector_count: count,
            dimension: self.dimension,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
