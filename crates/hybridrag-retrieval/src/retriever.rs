//! 检索器：把向量存储的结果转换为排名列表

use async_trait::async_trait;
use hybridrag_core::{Document, RankedList, Result};
use hybridrag_vector::{SearchQuery, SearchResult, VectorStore};
use std::sync::Arc;

/// 给定查询向量，返回至多 `k` 条按相关度排序的文档
#[async_trait]
pub trait Retriever: Send + Sync {
    /// 来源标签，融合结果中用它标注文档出处
    fn source(&self) -> &str;

    async fn search(&self, query_vector: &[f32], k: usize) -> Result<RankedList>;
}

pub struct VectorStoreRetriever {
    source: String,
    store: Arc<dyn VectorStore>,
    min_score: Option<f32>,
}

impl VectorStoreRetriever {
    pub fn new(source: impl Into<String>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            source: source.into(),
            store,
            min_score: None,
        }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    fn to_document(&self, result: SearchResult) -> Document {
        let mut document = Document::new(result.id, "");

        if let serde_json::Value::Object(map) = result.payload {
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("content", serde_json::Value::String(text)) => document.content = text,
                    (_, serde_json::Value::String(text)) => {
                        document.metadata.insert(key, text);
                    }
                    (_, serde_json::Value::Null) => {}
                    (_, other) => {
                        document.metadata.insert(key, other.to_string());
                    }
                }
            }
        }

        document
            .metadata
            .insert("similarity".to_string(), format!("{:.4}", result.score));
        document
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    fn source(&self) -> &str {
        &self.source
    }

    async fn search(&self, query_vector: &[f32], k: usize) -> Result<RankedList> {
        let mut query = SearchQuery::new(query_vector.to_vec()).with_limit(k);
        if let Some(min_score) = self.min_score {
            query = query.with_min_score(min_score);
        }

        let results = self.store.search(query).await?;
        tracing::debug!(
            "{} ({}) returned {} candidates",
            self.source,
            self.store.name(),
            results.len()
        );

        Ok(RankedList::new(
            self.source.clone(),
            results.into_iter().map(|r| self.to_document(r)).collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybridrag_vector::{MemoryStore, VectorItem};
    use serde_json::json;

    async fn seeded_store() -> Arc<dyn VectorStore> {
        let store = MemoryStore::new();
        store
            .upsert_batch(vec![
                VectorItem::new(
                    vec![1.0, 0.0],
                    json!({"content": "Motor is very loud", "product_id": "B01", "rating": 2}),
                )
                .with_id("r1-0"),
                VectorItem::new(vec![0.6, 0.8], json!({"content": "Quiet and fast"})).with_id("r2-0"),
                VectorItem::new(vec![0.0, 1.0], json!({"content": "Looks nice"})).with_id("r3-0"),
            ])
            .await
            .unwrap();
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_search_maps_payload_to_document() {
        let retriever = VectorStoreRetriever::new("structured", seeded_store().await);
        let list = retriever.search(&[1.0, 0.0], 2).await.unwrap();

        assert_eq!(list.source, "structured");
        assert_eq!(list.len(), 2);

        let top = &list.documents[0];
        assert_eq!(top.id, "r1-0");
        assert_eq!(top.content, "Motor is very loud");
        assert_eq!(top.metadata("product_id"), Some("B01"));
        assert_eq!(top.metadata("rating"), Some("2"));
        assert_eq!(top.metadata("similarity"), Some("1.0000"));
        assert_eq!(list.documents[1].id, "r2-0");
    }

    #[tokio::test]
    async fn test_min_score_drops_weak_matches() {
        let retriever =
            VectorStoreRetriever::new("unstructured", seeded_store().await).with_min_score(0.5);
        let list = retriever.search(&[1.0, 0.0], 10).await.unwrap();
        let ids: Vec<&str> = list.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["r1-0", "r2-0"]);
    }

    #[tokio::test]
    async fn test_empty_store_gives_empty_list() {
        let retriever = VectorStoreRetriever::new("structured", Arc::new(MemoryStore::new()));
        let list = retriever.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(list.is_empty());
    }
}
