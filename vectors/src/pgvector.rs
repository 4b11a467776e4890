#![cfg(feature = "pgvector")]

//! pgvector backend. Schema-on-write: one table per namespace, created
//! on first write and seeded with a tagged placeholder row that fixes
//! the vector dimensionality. The placeholder never appears in query
//! results or stats. Cosine distance from the `<=>` operator is
//! converted with `score = 1 - distance`.

use crate::VectorBackend;
use crate::error::{VectorError, VectorResult};
use crate::filter::Filter;
use crate::types::{
    DeleteOutcome, NamespaceStats, QueryMatch, QueryRequest, UpsertOutcome, VectorRecord,
};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgPoolOptions};
use std::collections::HashMap;

const PLACEHOLDER_ID: &str = "__ns_init__";
const PLACEHOLDER_EXCLUSION: &str = r#"NOT (metadata @> '{"__placeholder__": true}')"#;

pub struct PgvectorBackend {
    pool: PgPool,
    schema: String,
    table_prefix: String,
    dimension: usize,
}

/// Collapses a namespace into a safe SQL identifier fragment. Identifiers
/// cannot be bound as parameters, so anything outside [a-z0-9_] is
/// replaced before interpolation.
fn sanitize_identifier(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Escapes LIKE wildcards so a prefix such as `rag_` matches literally
/// instead of treating `_` as a single-character wildcard.
fn like_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl PgvectorBackend {
    pub async fn new(
        connection_string: &str,
        schema: impl Into<String>,
        table_prefix: impl Into<String>,
        dimension: usize,
    ) -> VectorResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(connection_string)
            .await
            .map_err(|e| VectorError::ConnectionFailed(format!("PostgreSQL: {e}")))?;

        let backend = Self {
            pool,
            schema: sanitize_identifier(&schema.into()),
            table_prefix: table_prefix.into(),
            dimension,
        };
        backend.ensure_extension().await?;
        Ok(backend)
    }

    async fn ensure_extension(&self) -> VectorResult<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| VectorError::Internal(format!("Failed to create vector extension: {e}")))?;
        Ok(())
    }

    fn table_name(&self, namespace: &str) -> String {
        format!(
            "{}_{}",
            sanitize_identifier(&self.table_prefix),
            sanitize_identifier(namespace)
        )
    }

    fn qualified_table(&self, namespace: &str) -> String {
        format!("{}.{}", self.schema, self.table_name(namespace))
    }

    /// Creates the namespace table on first write and seeds the tagged
    /// placeholder row that fixes the column dimensionality.
    async fn ensure_table(&self, namespace: &str) -> VectorResult<()> {
        let table = self.qualified_table(namespace);
        let create = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id TEXT PRIMARY KEY,
                vector vector({dim}),
                metadata JSONB NOT NULL DEFAULT '{{}}',
                updated_at TIMESTAMPTZ DEFAULT NOW()
            );

            CREATE INDEX IF NOT EXISTS idx_{index}_vector ON {table}
            USING hnsw (vector vector_cosine_ops);
            "#,
            table = table,
            index = self.table_name(namespace),
            dim = self.dimension,
        );

        sqlx::query(&create)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorError::Internal(format!("Failed to create table: {e}")))?;

        let seed = format!(
            r#"
            INSERT INTO {table} (id, vector, metadata)
            VALUES ($1, $2::vector, '{{"__placeholder__": true}}')
            ON CONFLICT (id) DO NOTHING
            "#,
        );
        let zero_vector = Self::vector_literal(&vec![0.0; self.dimension]);
        sqlx::query(&seed)
            .bind(PLACEHOLDER_ID)
            .bind(&zero_vector)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorError::Internal(format!("Failed to seed namespace: {e}")))?;

        Ok(())
    }

    fn vector_literal(v: &[f32]) -> String {
        let values: Vec<String> = v.iter().map(|f| f.to_string()).collect();
        format!("[{}]", values.join(","))
    }

    fn parse_vector(s: &str) -> Vec<f32> {
        s.trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect()
    }
}

#[async_trait]
impl VectorBackend for PgvectorBackend {
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

        self.ensure_table(namespace).await?;
        let table = self.qualified_table(namespace);

        let mut count = 0;
        for record in records {
            let vector = Self::vector_literal(&record.vector);
            let metadata = serde_json::to_value(&record.metadata)?;

            let query = format!(
                r#"
                INSERT INTO {table} (id, vector, metadata, updated_at)
                VALUES ($1, $2::vector, $3, NOW())
                ON CONFLICT (id) DO UPDATE SET
                    vector = EXCLUDED.vector,
                    metadata = EXCLUDED.metadata,
                    updated_at = NOW()
                "#,
            );

            sqlx::query(&query)
                .bind(&record.id)
                .bind(&vector)
                .bind(&metadata)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorError::Internal(format!("Upsert failed: {e}")))?;
            count += 1;
        }

        Ok(UpsertOutcome::new(count))
    }

    async fn query(&self, request: &QueryRequest) -> VectorResult<Vec<QueryMatch>> {
        self.ensure_table(&request.namespace).await?;
        let table = self.qualified_table(&request.namespace);
        let vector = Self::vector_literal(&request.vector);

        let mut sql = format!(
            r#"
            SELECT id, metadata, 1 - (vector <=> $1::vector) AS score
            FROM {table}
            WHERE {PLACEHOLDER_EXCLUSION}
            "#,
        );
        if let Some(predicate) = request.filter.as_ref().and_then(Filter::to_sql_predicate) {
            sql.push_str(&format!(" AND {predicate}"));
        }
        sql.push_str(&format!(
            " ORDER BY vector <=> $1::vector LIMIT {}",
            request.top_k
        ));

        let rows = sqlx::query(&sql)
            .bind(&vector)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorError::Internal(format!("Query failed: {e}")))?;

        let mut matches = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let metadata: serde_json::Value = row.get("metadata");
            let score: f64 = row.get("score");

            let metadata_map: HashMap<String, serde_json::Value> = metadata
                .as_object()
                .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();

            matches.push(QueryMatch {
                id,
                score: score as f32,
                metadata: if request.include_metadata {
                    metadata_map
                } else {
                    HashMap::new()
                },
            });
        }

        Ok(matches)
    }

    async fn delete_by_ids(&self, namespace: &str, ids: &[String]) -> VectorResult<DeleteOutcome> {
        if ids.is_empty() {
            return Ok(DeleteOutcome::new(0));
        }
        self.ensure_table(namespace).await?;
        let table = self.qualified_table(namespace);

        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("${i}")).collect();
        let query = format!(
            "DELETE FROM {table} WHERE id IN ({}) AND id <> '{PLACEHOLDER_ID}'",
            placeholders.join(", "),
        );

        let mut q = sqlx::query(&query);
        for id in ids {
            q = q.bind(id);
        }
        let result = q
            .execute(&self.pool)
            .await
            .map_err(|e| VectorError::Internal(format!("Delete failed: {e}")))?;

        Ok(DeleteOutcome::new(result.rows_affected() as usize))
    }

    async fn delete_by_filter(
        &self,
        namespace: &str,
        filter: &Filter,
    ) -> VectorResult<DeleteOutcome> {
        let Some(predicate) = filter.to_sql_predicate() else {
            return Err(VectorError::InvalidFilter(
                "empty filter would delete every record; use purge_namespace".into(),
            ));
        };
        self.ensure_table(namespace).await?;
        let table = self.qualified_table(namespace);

        let query =
            format!("DELETE FROM {table} WHERE {PLACEHOLDER_EXCLUSION} AND ({predicate})");
        let result = sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorError::Internal(format!("Delete by filter failed: {e}")))?;

        Ok(DeleteOutcome::new(result.rows_affected() as usize))
    }

    async fn purge_namespace(&self, namespace: &str) -> VectorResult<()> {
        let table = self.qualified_table(namespace);
        sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(&self.pool)
            .await
            .map_err(|e| VectorError::Internal(format!("Purge failed: {e}")))?;
        tracing::info!(table = %table, "Dropped namespace table");
        Ok(())
    }

    async fn list_namespaces(&self) -> VectorResult<Vec<String>> {
        let prefix = format!("{}_", sanitize_identifier(&self.table_prefix));
        let rows = sqlx::query(
            "SELECT tablename FROM pg_tables WHERE schemaname = $1 AND tablename LIKE $2 ESCAPE '\\'",
        )
        .bind(&self.schema)
        .bind(format!("{}%", like_escape(&prefix)))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| VectorError::Internal(format!("Failed to list namespaces: {e}")))?;

        let mut names: Vec<String> = rows
            .into_iter()
            .filter_map(|row| {
                let table: String = row.get("tablename");
                table.strip_prefix(&prefix).map(str::to_string)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    async fn stats(&self, namespace: &str) -> VectorResult<NamespaceStats> {
        self.ensure_table(namespace).await?;
        let table = self.qualified_table(namespace);

        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS n FROM {table} WHERE {PLACEHOLDER_EXCLUSION}"
        ))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| VectorError::Internal(format!("Stats failed: {e}")))?;

        let count: i64 = row.get("n");
        Ok(NamespaceStats {
            vector_count: count as usize,
            dimension: self.dimension,
        })
    }

    fn backend_name(&self) -> &'static str {
        "pgvector"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_identifier() {
        assert_eq!(sanitize_identifier("docs"), "docs");
        assert_eq!(sanitize_identifier("My-Namespace.1"), "my_namespace_1");
        assert_eq!(sanitize_identifier("a; DROP TABLE x"), "a__drop_table_x");
    }

    #[test]
    fn test_vector_literal_round_trip() {
        let v = vec![0.1, 0.2, 0.3];
        let literal = PgvectorBackend::vector_literal(&v);
        assert_eq!(literal, "[0.1,0.2,0.3]");

        let back = PgvectorBackend::parse_vector(&literal);
        assert_eq!(back.len(), 3);
        assert!((back[0] - 0.1).abs() < 0.001);
    }

    #[test]
    fn test_placeholder_exclusion_predicate() {
        assert!(PLACEHOLDER_EXCLUSION.contains("__placeholder__"));
    }

    #[test]
    fn test_like_escape_wildcards() {
        assert_eq!(like_escape("rag_"), "rag\\_");
        assert_eq!(like_escape("100%_a"), "100\\%\\_a");
        assert_eq!(like_escape("plain"), "plain");
    }
}
