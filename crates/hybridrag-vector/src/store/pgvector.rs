//! pgvector 向量存储实现 (结构化存储)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;

use crate::store::validate_identifier;
use crate::types::{SearchQuery, SearchResult, SetupOutcome, StoreStats, VectorItem};
use crate::VectorStore;
use hybridrag_core::{HybridRagError, Result};

pub struct PgVectorStore {
    pool: PgPool,
    table_name: String,
    dimension: usize,
}

impl PgVectorStore {
    /// Builds the pool without opening a connection. An unreachable server
    /// shows up as an error from the first query, bounded by
    /// `acquire_timeout`.
    pub fn connect_lazy(
        connection_string: &str,
        table_name: &str,
        dimension: usize,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        validate_identifier(table_name)?;

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(connection_string)
            .map_err(|e| HybridRagError::Config(format!("Invalid PostgreSQL URL: {}", e)))?;

        Ok(Self::with_pool(pool, table_name, dimension))
    }

    /// Wraps an existing pool. The table name must already be validated.
    pub fn with_pool(pool: PgPool, table_name: &str, dimension: usize) -> Self {
        Self {
            pool,
            table_name: table_name.to_string(),
            dimension,
        }
    }

    fn db_error(action: &str, e: sqlx::Error) -> HybridRagError {
        HybridRagError::VectorStore(format!("Failed to {}: {}", action, e))
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(HybridRagError::VectorStore(format!(
                "vector has {} dimensions, table '{}' expects {}",
                vector.len(),
                self.table_name,
                self.dimension
            )));
        }
        Ok(())
    }

    pub(crate) fn vector_to_string(vector: &[f32]) -> String {
        format!(
            "[{}]",
            vector
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(",")
        )
    }

    pub(crate) fn string_to_vector(s: &str) -> Vec<f32> {
        let s = s.trim();
        match s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(inner) => inner
                .split(',')
                .filter_map(|v| v.trim().parse::<f32>().ok())
                .collect(),
            None => Vec::new(),
        }
    }

    fn parse_payload(payload_json: Option<String>) -> serde_json::Value {
        payload_json
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or(serde_json::Value::Null)
    }

    async fn table_exists(&self) -> Result<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(&self.table_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::db_error("check table", e))
    }

    async fn insert(&self, item: &VectorItem, executor: &mut sqlx::PgConnection) -> Result<()> {
        self.check_dimension(&item.vector)?;

        let sql = format!(
            "INSERT INTO {} (id, vector, content, payload, created_at) \
             VALUES ($1, $2::vector, $3, $4::jsonb, $5) \
             ON CONFLICT (id) DO UPDATE SET vector = EXCLUDED.vector, content = EXCLUDED.content, \
             payload = EXCLUDED.payload",
            self.table_name
        );

        sqlx::query(&sql)
            .bind(&item.id)
            .bind(Self::vector_to_string(&item.vector))
            .bind(item.content())
            .bind(item.payload.to_string())
            .bind(item.created_at)
            .execute(executor)
            .await
            .map_err(|e| Self::db_error("upsert", e))?;

        Ok(())
    }
}

/// 距离排序交给索引，相同分数在取回后按 id 排序
pub(crate) fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn name(&self) -> &str {
        "pgvector"
    }

    async fn setup(&self) -> Result<SetupOutcome> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await
            .map_err(|e| Self::db_error("create extension", e))?;

        if self.table_exists().await? {
            tracing::debug!("pgvector table {} already exists", self.table_name);
            return Ok(SetupOutcome::AlreadyExists);
        }

        let create_table_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                vector VECTOR({}) NOT NULL,
                content TEXT,
                payload JSONB,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
            self.table_name, self.dimension
        );

        sqlx::query(&create_table_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::db_error("create table", e))?;

        let create_index_sql = format!(
            "CREATE INDEX IF NOT EXISTS {table}_vector_idx ON {table} \
             USING ivfflat (vector vector_cosine_ops) WITH (lists = 100)",
            table = self.table_name
        );

        sqlx::query(&create_index_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::db_error("create index", e))?;

        tracing::info!("Created pgvector table {} ({} dims)", self.table_name, self.dimension);
        Ok(SetupOutcome::Created)
    }

    async fn upsert(&self, item: VectorItem) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| Self::db_error("acquire connection", e))?;
        self.insert(&item, &mut conn).await
    }

    async fn upsert_batch(&self, items: Vec<VectorItem>) -> Result<usize> {
        let count = items.len();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::db_error("begin transaction", e))?;

        for item in &items {
            self.insert(item, &mut tx).await?;
        }

        tx.commit()
            .await
            .map_err(|e| Self::db_error("commit transaction", e))?;

        Ok(count)
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
        self.check_dimension(&query.vector)?;

        let sql = format!(
            "SELECT id, payload::text, (1 - (vector <=> $1::vector))::float8 AS score \
             FROM {} ORDER BY vector <=> $1::vector LIMIT $2",
            self.table_name
        );

        let rows: Vec<PgRow> = sqlx::query(&sql)
            .bind(Self::vector_to_string(&query.vector))
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Self::db_error("search", e))?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get(0);
            let payload_json: Option<String> = row.get(1);
            let score = row.get::<f64, _>(2) as f32;

            if let Some(min_score) = query.min_score
                && score < min_score
            {
                continue;
            }

            results.push(SearchResult {
                id,
                score,
                payload: Self::parse_payload(payload_json),
            });
        }

        sort_results(&mut results);
        Ok(results)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorItem>> {
        let sql = format!(
            "SELECT id, vector::text, payload::text, created_at FROM {} WHERE id = $1",
            self.table_name
        );

        let row: Option<PgRow> = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Self::db_error("get", e))?;

        Ok(row.map(|row| {
            let vector_str: String = row.get(1);
            let created_at: DateTime<Utc> = row.get(3);
            VectorItem {
                id: row.get(0),
                vector: Self::string_to_vector(&vector_str),
                payload: Self::parse_payload(row.get(2)),
                created_at,
            }
        }))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = $1", self.table_name);

        sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::db_error("delete", e))?;

        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table_name);

        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Self::db_error("get stats", e))?;

        Ok(StoreStats {
            total_vectors: count as usize,
            last_updated: Utc::now(),
        })
    }

    async fn clear(&self) -> Result<()> {
        let sql = format!("DELETE FROM {}", self.table_name);

        sqlx::query(&sql)
            .execute(&self.pool)
            .await
            .map_err(|e| Self::db_error("clear", e))?;

        Ok(())
    }
}
