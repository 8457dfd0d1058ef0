//! 根据配置构建提供商、存储和流水线

use anyhow::{Context, Result};
use hybridrag_ai::{AIProvider, OpenAIProvider, ProviderConfig};
use hybridrag_core::Config;
use hybridrag_retrieval::{AIProviderEmbedding, EmbeddingProvider};
use hybridrag_vector::{create_store, StoreBackend, VectorStore};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path).with_context(|| format!("loading {}", path.display()))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

pub fn embedding_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = OpenAIProvider::new(
        ProviderConfig::new("openai")
            .with_api_key(config.embedding.api_key.clone())
            .with_base_url(config.embedding.base_url.clone())
            .with_timeout_ms(config.embedding.timeout_ms),
    )?;

    Ok(Arc::new(AIProviderEmbedding::new(
        Arc::new(provider),
        config.embedding.model.clone(),
        config.embedding.dimensions,
    )))
}

pub fn chat_provider(config: &Config) -> Result<Arc<dyn AIProvider>> {
    let provider = OpenAIProvider::new(
        ProviderConfig::new("openai")
            .with_api_key(config.generation.api_key.clone())
            .with_base_url(config.generation.base_url.clone())
            .with_timeout_ms(config.generation.timeout_ms),
    )?;
    Ok(Arc::new(provider))
}

pub async fn structured_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let url = config
        .structured_store
        .url
        .clone()
        .context("structured_store.url is not set (or export DATABASE_URL)")?;

    let store = create_store(StoreBackend::PgVector {
        url,
        table: config.structured_store.table.clone(),
        dimension: config.embedding.dimensions,
        max_connections: config.structured_store.max_connections,
        acquire_timeout: Duration::from_millis(config.structured_store.acquire_timeout_ms),
    })
    .await?;
    Ok(store)
}

pub async fn unstructured_store(config: &Config) -> Result<Arc<dyn VectorStore>> {
    let url = config
        .unstructured_store
        .url
        .clone()
        .context("unstructured_store.url is not set (or export QDRANT_URL)")?;

    let store = create_store(StoreBackend::Qdrant {
        url,
        collection: config.unstructured_store.collection.clone(),
        api_key: config.unstructured_store.api_key.clone(),
        dimension: config.embedding.dimensions,
    })
    .await?;
    Ok(store)
}
