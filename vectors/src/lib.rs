//! Pluggable vector store backends behind a single contract.
//!
//! Namespaced upsert/query/delete with a generic metadata filter
//! grammar translated to each backend's native predicate form. Scores
//! are always oriented higher = more similar.

pub mod error;
pub mod factory;
pub mod filter;
pub mod memory;
pub mod pgvector;
pub mod pinecone;
pub mod qdrant;
pub mod types;

pub use error::{VectorError, VectorResult};
pub use factory::{VectorBackendType, create_backend};
pub use filter::{Comparison, Filter};
pub use memory::MemoryBackend;
pub use types::{
    DeleteOutcome, NamespaceStats, QueryMatch, QueryRequest, UpsertOutcome, VectorRecord,
};

use async_trait::async_trait;

/// Backend-agnostic vector store contract. Namespaces are logical
/// partitions, lazily created on first write.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Inserts or overwrites records by id. Idempotent per id.
    async fn upsert(
        &self,
        namespace: &str,
        records: Vec<VectorRecord>,
    ) -> VectorResult<UpsertOutcome>;

    /// Nearest-neighbor search with optional metadata filtering.
    async fn query(&self, request: &QueryRequest) -> VectorResult<Vec<QueryMatch>>;

    async fn delete_by_ids(&self, namespace: &str, ids: &[String]) -> VectorResult<DeleteOutcome>;

    /// Deletes every record matching the filter. An empty filter is
    /// rejected with [`VectorError::InvalidFilter`]; wiping a namespace
    /// goes through [`Self::purge_namespace`].
    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &Filter,
    ) -> VectorResult<DeleteOutcome>;

    /// Removes the namespace and everything in it.
    async fn purge_namespace(&self, namespace: &str) -> VectorResult<()>;

    async fn list_namespaces(&self) -> VectorResult<Vec<String>>;

    async fn stats(&self, namespace: &str) -> VectorResult<NamespaceStats>;

    fn backend_name(&self) -> &'static str;
}
