use crate::filter::Filter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl VectorRecord {
    pub fn new(
        id: impl Into<String>,
        vector: Vec<f32>,
        metadata: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub namespace: String,
    pub top_k: usize,
    pub filter: Option<Filter>,
    pub include_metadata: bool,
}

impl QueryRequest {
    pub fn new(namespace: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            vector,
            namespace: namespace.into(),
            top_k: 10,
            filter: None,
            include_metadata: true,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }
}

/// One similarity match. `score` is always oriented higher = more
/// similar; backends reporting a native distance convert it first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct UpsertOutcome {
    pub upserted_count: usize,
}

impl UpsertOutcome {
    pub fn new(count: usize) -> Self {
        Self {
            upserted_count: count,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeleteOutcome {
    pub deleted_count: usize,
}

impl DeleteOutcome {
    pub fn new(count: usize) -> Self {
        Self {
            deleted_count: count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceStats {
    pub vector_count: usize,
    pub dimension: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_record_builder() {
        let record = VectorRecord::new("doc-1", vec![0.1, 0.2], HashMap::new())
            .with_metadata("source", serde_json::json!("manual"));

        assert_eq!(record.id, "doc-1");
        assert_eq!(
            record.metadata.get("source"),
            Some(&serde_json::json!("manual"))
        );
    }

    #[test]
    fn test_query_request_builder() {
        let req = QueryRequest::new("docs", vec![0.1, 0.2])
            .with_top_k(5)
            .with_metadata(false);

        assert_eq!(req.namespace, "docs");
        assert_eq!(req.top_k, 5);
        assert!(!req.include_metadata);
        assert!(req.filter.is_none());
    }
}
