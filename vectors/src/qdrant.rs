//! Qdrant backend. One collection per namespace, lazily created with
//! the configured dimensionality; qdrant reports cosine similarity
//! natively so scores need no conversion.

use crate::VectorBackend;
use crate::error::{VectorError, VectorResult};
use crate::filter::Filter;
use crate::types::{
    DeleteOutcome, NamespaceStats, QueryMatch, QueryRequest, UpsertOutcome, VectorRecord,
};
use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, DeletePointsBuilder, Distance,
    Filter as QdrantFilter, PointId, PointStruct, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParams, VectorsConfig, point_id::PointIdOptions,
    vectors_config::Config,
};
use std::collections::HashMap;
use std::sync::Arc;

pub struct QdrantBackend {
    client: Arc<Qdrant>,
    collection_prefix: String,
    dimension: usize,
}

impl QdrantBackend {
    pub fn new(
        url: &str,
        api_key: Option<String>,
        collection_prefix: impl Into<String>,
        dimension: usize,
    ) -> VectorResult<Self> {
        let mut builder = Qdrant::from_url(url);
        if let Some(key) = api_key {
            builder = builder.api_key(key);
        }
        let client = builder
            .build()
            .map_err(|e| VectorError::ConnectionFailed(format!("{url}: {e}")))?;

        Ok(Self {
            client: Arc::new(client),
            collection_prefix: collection_prefix.into(),
            dimension,
        })
    }

    fn collection_name(&self, namespace: &str) -> String {
        format!("{}_{}", self.collection_prefix, namespace)
    }

    async fn collection_exists(&self, collection_name: &str) -> VectorResult<bool> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorError::Internal(format!("Failed to list collections: {e}")))?;
        Ok(collections
            .collections
            .iter()
            .any(|c| c.name == collection_name))
    }

    async fn ensure_collection(&self, namespace: &str) -> VectorResult<()> {
        let collection_name = self.collection_name(namespace);

        if !self.collection_exists(&collection_name).await? {
            let request =
                CreateCollectionBuilder::new(&collection_name).vectors_config(VectorsConfig {
                    config: Some(Config::Params(VectorParams {
                        size: self.dimension as u64,
                        distance: Distance::Cosine.into(),
                        ..Default::default()
                    })),
                });

            self.client
                .create_collection(request)
                .await
                .map_err(|e| VectorError::Internal(format!("Failed to create collection: {e}")))?;
            tracing::info!(collection = %collection_name, dimension = self.dimension, "Created qdrant collection");
        }

        Ok(())
    }

    fn record_to_point(record: &VectorRecord) -> PointStruct {
        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        for (key, value) in &record.metadata {
            if let Some(s) = value.as_str() {
                payload.insert(key.clone(), s.to_string().into());
            } else if let Some(n) = value.as_i64() {
                payload.insert(key.clone(), n.into());
            } else if let Some(f) = value.as_f64() {
                payload.insert(key.clone(), f.into());
            } else if let Some(b) = value.as_bool() {
                payload.insert(key.clone(), b.into());
            } else {
                payload.insert(key.clone(), value.to_string().into());
            }
        }

        PointStruct {
            id: Some(PointId::from(record.id.clone())),
            vectors: Some(record.vector.clone().into()),
            payload,
        }
    }

    fn point_id_string(id: PointId) -> String {
        match id.point_id_options {
            Some(PointIdOptions::Uuid(u)) => u,
            Some(PointIdOptions::Num(n)) => n.to_string(),
            None => String::new(),
        }
    }
}

#[async_trait]
impl VectorBackend for QdrantBackend {
    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> VectorResult<UpsertOutcome> {
        self.ensure_collection(namespace).await?;

        let collection_name = self.collection_name(namespace);
        let points: Vec<PointStruct> = records.iter().map(Self::record_to_point).collect();
        let count = points.len();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&collection_name, points))
            .await
            .map_err(|e| VectorError::Internal(format!("Upsert failed: {e}")))?;

        Ok(UpsertOutcome::new(count))
    }

    async fn query(&self, request: &QueryRequest) -> VectorResult<Vec<QueryMatch>> {
        self.ensure_collection(&request.namespace).await?;

        let collection_name = self.collection_name(&request.namespace);
        let mut search = SearchPointsBuilder::new(
            &collection_name,
            request.vector.clone(),
            request.top_k as u64,
        )
        .with_payload(request.include_metadata);

        if let Some(filter) = &request.filter {
            search = search.filter(filter.to_qdrant_filter()?);
        }

        let result = self
            .client
            .search_points(search)
            .await
            .map_err(|e| VectorError::Internal(format!("Search failed: {e}")))?;

        Ok(result
            .result
            .into_iter()
            .filter_map(|p| {
                let id = Self::point_id_string(p.id?);
                let metadata: HashMap<String, serde_json::Value> = p
                    .payload
                    .into_iter()
                    .map(|(k, v)| (k, v.into()))
                    .collect();
                Some(QueryMatch {
                    id,
                    score: p.score,
                    metadata,
                })
            })
            .collect())
    }

    async fn delete_by_ids(&self, namespace: &str, ids: &[String]) -> VectorResult<DeleteOutcome> {
        self.ensure_collection(namespace).await?;

        let collection_name = self.collection_name(namespace);
        let point_ids: Vec<PointId> = ids.iter().cloned().map(PointId::from).collect();

        // Count the ids that actually exist; the delete response does not
        // report how many points it removed.
        let id_filter = QdrantFilter {
            must: vec![Condition::has_id(point_ids.clone())],
            ..Default::default()
        };
        let counted = self
            .client
            .count(
                CountPointsBuilder::new(&collection_name)
                    .filter(id_filter)
                    .exact(true),
            )
            .await
            .map_err(|e| VectorError::Internal(format!("Count failed: {e}")))?;
        let count = counted.result.map_or(0, |r| r.count as usize);

        self.client
            .delete_points(DeletePointsBuilder::new(&collection_name).points(point_ids))
            .await
            .map_err(|e| VectorError::Internal(format!("Delete failed: {e}")))?;

        Ok(DeleteOutcome::new(count))
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
        self.ensure_collection(namespace).await?;

        let collection_name = self.collection_name(namespace);
        let qdrant_filter = filter.to_qdrant_filter()?;

        // Count first; the delete response does not report how many
        // points matched.
        let counted = self
            .client
            .count(
                CountPointsBuilder::new(&collection_name)
                    .filter(qdrant_filter.clone())
                    .exact(true),
            )
            .await
            .map_err(|e| VectorError::Internal(format!("Count failed: {e}")))?;
        let count = counted.result.map_or(0, |r| r.count as usize);

        self.client
            .delete_points(DeletePointsBuilder::new(&collection_name).points(qdrant_filter))
            .await
            .map_err(|e| VectorError::Internal(format!("Delete by filter failed: {e}")))?;

        Ok(DeleteOutcome::new(count))
    }

    async fn purge_namespace(&self, namespace: &str) -> VectorResult<()> {
        let collection_name = self.collection_name(namespace);
        self.client
            .delete_collection(&collection_name)
            .await
            .map_err(|e| VectorError::Internal(format!("Purge failed: {e}")))?;
        tracing::info!(collection = %collection_name, "Purged qdrant collection");
        Ok(())
    }

    async fn list_namespaces(&self) -> VectorResult<Vec<String>> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| VectorError::Internal(format!("Failed to list collections: {e}")))?;

        let prefix = format!("{}_", self.collection_prefix);
        let mut names: Vec<String> = collections
            .collections
            .into_iter()
            .filter_map(|c| c.name.strip_prefix(&prefix).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn stats(&self, namespace: &str) -> VectorResult<NamespaceStats> {
        let collection_name = self.collection_name(namespace);

        // A namespace nothing has written to yet is empty, not an error.
        if !self.collection_exists(&collection_name).await? {
            return Ok(NamespaceStats {
                vector_count: 0,
                dimension: self.dimension,
            });
        }

        let info = self
            .client
            .collection_info(&collection_name)
            .await
            .map_err(|e| VectorError::Internal(format!("Collection info failed: {e}")))?;

        let vector_count = info
            .result
            .and_then(|r| r.points_count)
            .unwrap_or(0) as usize;

        Ok(NamespaceStats {
            vector_count,
            dimension: self.dimension,
        })
    }

    fn backend_name(&self) -> &'static str {
        "qdrant"
    }
}
