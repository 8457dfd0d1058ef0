//! 内存向量存储 (用于测试和开发)

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::types::{cosine_similarity, SearchQuery, SearchResult, SetupOutcome, StoreStats, VectorItem};
use crate::VectorStore;
use hybridrag_core::{HybridRagError, Result};

/// 内存向量存储
pub struct MemoryStore {
    name: String,
    data: RwLock<HashMap<String, VectorItem>>,
    initialized: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_name("memory")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
        }
    }

    fn poisoned() -> HybridRagError {
        HybridRagError::VectorStore("Lock poisoned".to_string())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self) -> Result<SetupOutcome> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            Ok(SetupOutcome::AlreadyExists)
        } else {
            Ok(SetupOutcome::Created)
        }
    }

    async fn upsert(&self, item: VectorItem) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Self::poisoned())?;
        data.insert(item.id.clone(), item);
        Ok(())
    }

    async fn upsert_batch(&self, items: Vec<VectorItem>) -> Result<usize> {
        let mut data = self.data.write().map_err(|_| Self::poisoned())?;
        let count = items.len();
        for item in items {
            data.insert(item.id.clone(), item);
        }
        Ok(count)
    }

    async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
        let data = self.data.read().map_err(|_| Self::poisoned())?;

        let mut results: Vec<SearchResult> = data
            .values()
            .map(|item| SearchResult {
                id: item.id.clone(),
                score: cosine_similarity(&query.vector, &item.vector),
                payload: item.payload.clone(),
            })
            .collect();

        // 相似度相同时按 id 排序，保证结果可复现
        results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));

        if let Some(min_score) = query.min_score {
            results.retain(|r| r.score >= min_score);
        }

        results.truncate(query.limit);

        Ok(results)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorItem>> {
        let data = self.data.read().map_err(|_| Self::poisoned())?;
        Ok(data.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Self::poisoned())?;
        data.remove(id);
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let data = self.data.read().map_err(|_| Self::poisoned())?;
        Ok(StoreStats {
            total_vectors: data.len(),
            last_updated: Utc::now(),
        })
    }

    async fn clear(&self) -> Result<()> {
        let mut data = self.data.write().map_err(|_| Self::poisoned())?;
        data.clear();
        Ok(())
    }
}
