//! 向量存储抽象层实现

mod memory;
mod pgvector;
mod qdrant;

use async_trait::async_trait;
use hybridrag_core::Result;
use std::sync::Arc;
use std::time::Duration;

pub use memory::MemoryStore;
pub use pgvector::PgVectorStore;
pub use qdrant::QdrantStore;

use super::types::{SearchQuery, SearchResult, SetupOutcome, StoreStats, VectorItem};

/// 向量存储 Trait
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 后端名称，用于日志和结果来源标注
    fn name(&self) -> &str;
    /// 幂等地创建表/集合及索引
    async fn setup(&self) -> Result<SetupOutcome>;
    async fn upsert(&self, item: VectorItem) -> Result<()>;
    async fn upsert_batch(&self, items: Vec<VectorItem>) -> Result<usize>;
    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>>;
    async fn get(&self, id: &str) -> Result<Option<VectorItem>>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn stats(&self) -> Result<StoreStats>;
    async fn clear(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub enum StoreBackend {
    Memory,
    PgVector {
        url: String,
        table: String,
        dimension: usize,
        max_connections: u32,
        acquire_timeout: Duration,
    },
    Qdrant {
        url: String,
        collection: String,
        api_key: Option<String>,
        dimension: usize,
    },
}

pub async fn create_store(backend: StoreBackend) -> Result<Arc<dyn VectorStore>> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StoreBackend::PgVector {
            url,
            table,
            dimension,
            max_connections,
            acquire_timeout,
        } => {
            // 连接延迟到第一次查询，失败由检索的 FailurePolicy 处理
            let store =
                PgVectorStore::connect_lazy(&url, &table, dimension, max_connections, acquire_timeout)?;
            Ok(Arc::new(store))
        }
        StoreBackend::Qdrant {
            url,
            collection,
            api_key,
            dimension,
        } => {
            let store = QdrantStore::new(&url, &collection, dimension, api_key.as_deref())?;
            Ok(Arc::new(store))
        }
    }
}

/// Table and collection names end up in SQL text and URLs, so only plain
/// identifiers are accepted.
pub(crate) fn validate_identifier(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(hybridrag_core::HybridRagError::Config(format!(
            "invalid table/collection name: '{}'",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("review_chunks").is_ok());
        assert!(validate_identifier("_tmp1").is_ok());
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1reviews").is_err());
        assert!(validate_identifier("reviews; DROP TABLE x").is_err());
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        let store = create_store(StoreBackend::Memory).await.unwrap();
        assert_eq!(store.name(), "memory");
        assert_eq!(store.stats().await.unwrap().total_vectors, 0);
    }

    #[tokio::test]
    async fn test_create_pgvector_store_does_not_connect() {
        let store = create_store(StoreBackend::PgVector {
            url: "postgresql://hybridrag@127.0.0.1:1/reviews".to_string(),
            table: "review_chunks".to_string(),
            dimension: 3,
            max_connections: 1,
            acquire_timeout: Duration::from_millis(200),
        })
        .await
        .unwrap();
        assert_eq!(store.name(), "pgvector");
        assert!(store.stats().await.is_err());
    }
}
