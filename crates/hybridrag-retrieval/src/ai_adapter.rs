use async_trait::async_trait;
use hybridrag_ai::{AIProvider, EmbeddingRequest};
use hybridrag_core::{HybridRagError, Result};
use std::sync::Arc;

use crate::embedding::{Embedding, EmbeddingProvider, Embeddings};

/// 用任意 `AIProvider` 生成嵌入向量
pub struct AIProviderEmbedding {
    provider: Arc<dyn AIProvider>,
    model: String,
    dimensions: usize,
}

impl AIProviderEmbedding {
    pub fn new(provider: Arc<dyn AIProvider>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            provider,
            model: model.into(),
            dimensions,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for AIProviderEmbedding {
    fn name(&self) -> &str {
        self.provider.name()
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Embedding> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HybridRagError::Embedding("provider returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Embeddings> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let response = self.provider.embed(request).await?;

        if response.embeddings.len() != texts.len() {
            return Err(HybridRagError::Embedding(format!(
                "requested {} embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }
        if let Some(bad) = response.embeddings.iter().find(|e| e.len() != self.dimensions) {
            return Err(HybridRagError::Embedding(format!(
                "model {} returned {} dimensions, expected {}",
                self.model,
                bad.len(),
                self.dimensions
            )));
        }

        Ok(response.embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hybridrag_testing::MockAiProvider;

    #[tokio::test]
    async fn test_embed_batch_uses_provider() {
        let provider = Arc::new(MockAiProvider::new().with_dimensions(8));
        let embedder = AIProviderEmbedding::new(provider.clone(), "mock-embed", 8);

        let vectors = embedder
            .embed_batch(&["loud".to_string(), "quiet".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 8));
        assert_eq!(provider.embed_call_count(), 1);
    }

    #[tokio::test]
    async fn test_embed_is_deterministic() {
        let embedder =
            AIProviderEmbedding::new(Arc::new(MockAiProvider::new().with_dimensions(8)), "m", 8);
        let a = embedder.embed("same text").await.unwrap();
        let b = embedder.embed("same text").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_error() {
        let embedder =
            AIProviderEmbedding::new(Arc::new(MockAiProvider::new().with_dimensions(4)), "m", 8);
        let err = embedder.embed("text").await.unwrap_err();
        assert!(matches!(err, HybridRagError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_skips_provider() {
        let provider = Arc::new(MockAiProvider::new());
        let embedder = AIProviderEmbedding::new(provider.clone(), "m", 16);
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
        assert_eq!(provider.embed_call_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_failure_propagates() {
        let embedder =
            AIProviderEmbedding::new(Arc::new(MockAiProvider::new().with_failure()), "m", 16);
        assert!(embedder.embed("text").await.is_err());
    }
}
