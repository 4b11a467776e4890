//! Backend selection at startup. The chosen backend is handed out as
//! `Arc<dyn VectorBackend>`; callers never branch on the concrete type.

use crate::VectorBackend;
use crate::error::{VectorError, VectorResult};
use crate::memory::MemoryBackend;
use crate::qdrant::QdrantBackend;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VectorBackendType {
    #[default]
    Memory,
    Qdrant,
    Pinecone,
    Pgvector,
}

impl std::fmt::Display for VectorBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorBackendType::Memory => write!(f, "memory"),
            VectorBackendType::Qdrant => write!(f, "qdrant"),
            VectorBackendType::Pinecone => write!(f, "pinecone"),
            VectorBackendType::Pgvector => write!(f, "pgvector"),
        }
    }
}

impl std::str::FromStr for VectorBackendType {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(VectorBackendType::Memory),
            "qdrant" => Ok(VectorBackendType::Qdrant),
            "pinecone" => Ok(VectorBackendType::Pinecone),
            "pgvector" | "postgres" => Ok(VectorBackendType::Pgvector),
            _ => Err(VectorError::Configuration(format!(
                "Unknown backend type: {s}. Valid options: memory, qdrant, pinecone, pgvector"
            ))),
        }
    }
}

pub async fn create_backend(settings: &config::Settings) -> VectorResult<Arc<dyn VectorBackend>> {
    let backend_type: VectorBackendType = settings.vector.backend.parse()?;
    let dimension = settings.embedding.dimension;

    let backend: Arc<dyn VectorBackend> = match backend_type {
        VectorBackendType::Memory => Arc::new(MemoryBackend::new(dimension)),
        VectorBackendType::Qdrant => Arc::new(QdrantBackend::new(
            &settings.vector.qdrant_url,
            settings.vector.qdrant_api_key.clone(),
            settings.vector.namespace_prefix.clone(),
            dimension,
        )?),
        #[cfg(feature = "pinecone")]
        VectorBackendType::Pinecone => {
            let api_key = settings.vector.pinecone_api_key.clone().ok_or_else(|| {
                VectorError::Configuration("Pinecone backend requires an API key".into())
            })?;
            Arc::new(
                crate::pinecone::PineconeBackend::connect(
                    api_key,
                    &settings.vector.pinecone_index,
                    dimension,
                )
                .await?,
            )
        }
        #[cfg(not(feature = "pinecone"))]
        VectorBackendType::Pinecone => {
            return Err(VectorError::Configuration(
                "Pinecone backend not compiled in; enable the `pinecone` feature".into(),
            ));
        }
        #[cfg(feature = "pgvector")]
        VectorBackendType::Pgvector => {
            let url = settings.vector.pg_url.as_deref().ok_or_else(|| {
                VectorError::Configuration("pgvector backend requires a connection string".into())
            })?;
            Arc::new(
                crate::pgvector::PgvectorBackend::new(
                    url,
                    settings.vector.pg_schema.clone(),
                    settings.vector.namespace_prefix.clone(),
                    dimension,
                )
                .await?,
            )
        }
        #[cfg(not(feature = "pgvector"))]
        VectorBackendType::Pgvector => {
            return Err(VectorError::Configuration(
                "pgvector backend not compiled in; enable the `pgvector` feature".into(),
            ));
        }
    };

    tracing::info!(backend = %backend_type, dimension, "Vector backend initialized");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!("memory".parse::<VectorBackendType>().unwrap(), VectorBackendType::Memory);
        assert_eq!("Qdrant".parse::<VectorBackendType>().unwrap(), VectorBackendType::Qdrant);
        assert_eq!(
            "postgres".parse::<VectorBackendType>().unwrap(),
            VectorBackendType::Pgvector
        );
        assert!("redis".parse::<VectorBackendType>().is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for t in [
            VectorBackendType::Memory,
            VectorBackendType::Qdrant,
            VectorBackendType::Pinecone,
            VectorBackendType::Pgvector,
        ] {
            assert_eq!(t.to_string().parse::<VectorBackendType>().unwrap(), t);
        }
    }

    #[tokio::test]
    async fn test_create_memory_backend() {
        let settings = config::Settings::for_tests();
        let backend = create_backend(&settings).await.unwrap();
        assert_eq!(backend.backend_name(), "memory");
    }
}
