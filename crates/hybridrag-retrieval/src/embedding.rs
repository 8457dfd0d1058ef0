//! Embedding Provider Trait
//!
//! 定义独立的嵌入向量生成接口

use async_trait::async_trait;
use hybridrag_core::Result;

pub type Embedding = Vec<f32>;
pub type Embeddings = Vec<Embedding>;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Embedding>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings>;
}
