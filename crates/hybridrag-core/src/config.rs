//! 配置管理
//!
//! 所有选项都有显式的默认值，加载时统一校验。密钥缺省时从环境变量读取。

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{HybridRagError, Result};

pub const DEFAULT_K_CONST: f64 = 60.0;

/// 主配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 排名融合
    pub fusion: FusionConfig,
    /// 检索调度
    pub retrieval: RetrievalConfig,
    /// 嵌入模型
    pub embedding: EmbeddingConfig,
    /// 答案生成
    pub generation: GenerationConfig,
    /// 文本切分
    pub chunking: ChunkingConfig,
    /// CSV 导入
    pub ingest: IngestConfig,
    /// 关系型向量库 (pgvector)
    pub structured_store: PgVectorConfig,
    /// 托管向量检索集群 (Qdrant)
    pub unstructured_store: QdrantConfig,
}

/// 排名融合配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// RRF 平滑常数
    pub k_const: f64,
    pub structured_weight: f64,
    pub unstructured_weight: f64,
    /// 返回条数上限
    pub top_n: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            k_const: DEFAULT_K_CONST,
            structured_weight: 0.5,
            unstructured_weight: 0.5,
            top_n: 5,
        }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.k_const.is_finite() || self.k_const < 0.0 {
            return Err(HybridRagError::Config(format!(
                "fusion.k_const must be a non-negative number, got {}",
                self.k_const
            )));
        }
        for (name, weight) in [
            ("structured_weight", self.structured_weight),
            ("unstructured_weight", self.unstructured_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(HybridRagError::Config(format!(
                    "fusion.{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }
        if self.structured_weight + self.unstructured_weight <= 0.0 {
            return Err(HybridRagError::Config(
                "fusion weights must sum to a positive value".to_string(),
            ));
        }
        if self.top_n == 0 {
            return Err(HybridRagError::Config("fusion.top_n must be positive".to_string()));
        }
        Ok(())
    }
}

/// 某个检索器失败时的处理方式
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// 任一检索器失败则整个查询失败
    #[default]
    Strict,
    /// 丢弃失败的检索器，只融合成功的列表
    Lenient,
}

/// 检索调度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// 每个检索器返回的候选数
    pub candidates_per_source: usize,
    pub timeout_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            candidates_per_source: 10,
            timeout_ms: 30_000,
            failure_policy: FailurePolicy::Strict,
        }
    }
}

/// 嵌入模型配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub dimensions: usize,
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            timeout_ms: 30_000,
        }
    }
}

/// 答案生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// 上下文文档的 token 预算
    pub max_context_tokens: usize,
    pub system_prompt: Option<String>,
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.0),
            max_tokens: Some(1024),
            max_context_tokens: 3000,
            system_prompt: None,
            timeout_ms: 60_000,
        }
    }
}

/// 文本切分配置 (单位: token)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            overlap: 64,
        }
    }
}

/// CSV 导入配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub id_column: String,
    /// 拼接成正文的列
    pub text_columns: Vec<String>,
    /// 原样保留为元数据的列
    pub metadata_columns: Vec<String>,
    /// 每批嵌入的块数
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            id_column: "review_id".to_string(),
            text_columns: vec!["review_title".to_string(), "review_text".to_string()],
            metadata_columns: vec!["product_id".to_string(), "rating".to_string()],
            batch_size: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PgVectorConfig {
    pub url: Option<String>,
    pub table: String,
    pub max_connections: u32,
    /// 获取连接的最长等待时间，数据库不可达时查询在此之后失败
    pub acquire_timeout_ms: u64,
}

impl Default for PgVectorConfig {
    fn default() -> Self {
        Self {
            url: None,
            table: "review_chunks".to_string(),
            max_connections: 5,
            acquire_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QdrantConfig {
    pub url: Option<String>,
    pub collection: String,
    pub api_key: Option<String>,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: None,
            collection: "review_chunks".to_string(),
            api_key: None,
        }
    }
}

impl Config {
    /// 从文件加载配置，文件不存在时使用默认值
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            Self::from_file(path)?
        } else {
            tracing::debug!("Config file {:?} not found, using defaults", path);
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HybridRagError::Config(format!("读取配置文件失败: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| HybridRagError::Config(format!("解析配置文件失败: {}", e)))
    }

    /// 保存配置到文件
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| HybridRagError::Config(format!("创建目录失败: {}", e)))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| HybridRagError::Config(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| HybridRagError::Config(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hybridrag")
            .join("config.json")
    }

    /// Fills unset secrets and endpoints from the environment. Values already
    /// present in the file win.
    pub fn apply_env(&mut self) {
        let api_key = env_var("HYBRIDRAG_API_KEY").or_else(|| env_var("OPENAI_API_KEY"));
        if self.embedding.api_key.is_none() {
            self.embedding.api_key = api_key.clone();
        }
        if self.generation.api_key.is_none() {
            self.generation.api_key = api_key;
        }
        if self.structured_store.url.is_none() {
            self.structured_store.url = env_var("DATABASE_URL");
        }
        if self.unstructured_store.url.is_none() {
            self.unstructured_store.url = env_var("QDRANT_URL");
        }
        if self.unstructured_store.api_key.is_none() {
            self.unstructured_store.api_key = env_var("QDRANT_API_KEY");
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.fusion.validate()?;

        if self.retrieval.candidates_per_source == 0 {
            return Err(HybridRagError::Config(
                "retrieval.candidates_per_source must be positive".to_string(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(HybridRagError::Config(
                "embedding.dimensions must be positive".to_string(),
            ));
        }
        if self.chunking.chunk_size == 0 || self.chunking.overlap >= self.chunking.chunk_size {
            return Err(HybridRagError::Config(format!(
                "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.overlap, self.chunking.chunk_size
            )));
        }
        if self.ingest.text_columns.is_empty() {
            return Err(HybridRagError::Config(
                "ingest.text_columns must name at least one column".to_string(),
            ));
        }
        if self.ingest.batch_size == 0 {
            return Err(HybridRagError::Config("ingest.batch_size must be positive".to_string()));
        }
        if self.generation.max_context_tokens == 0 {
            return Err(HybridRagError::Config(
                "generation.max_context_tokens must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fusion.k_const, 60.0);
        assert_eq!(config.fusion.structured_weight, config.fusion.unstructured_weight);
        assert_eq!(config.retrieval.failure_policy, FailurePolicy::Strict);
    }

    #[test]
    fn test_negative_weight_rejected() {
        let mut config = Config::default();
        config.fusion.structured_weight = -0.1;
        assert!(matches!(config.validate(), Err(HybridRagError::Config(_))));
    }

    #[test]
    fn test_zero_weights_rejected() {
        let mut config = Config::default();
        config.fusion.structured_weight = 0.0;
        config.fusion.unstructured_weight = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_top_n_rejected() {
        let mut config = Config::default();
        config.fusion.top_n = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let mut config = Config::default();
        config.chunking.overlap = config.chunking.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let json = r#"{ "fusion": { "top_n": 3 }, "retrieval": { "failure_policy": "lenient" } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.fusion.top_n, 3);
        assert_eq!(config.fusion.k_const, DEFAULT_K_CONST);
        assert_eq!(config.retrieval.failure_policy, FailurePolicy::Lenient);
        assert_eq!(config.chunking.chunk_size, 512);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.fusion.top_n = 7;
        config.unstructured_store.collection = "reviews_v2".to_string();
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.fusion.top_n, 7);
        assert_eq!(loaded.unstructured_store.collection, "reviews_v2");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.fusion.top_n, 5);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "fusion": { "top_n": 0 } }"#).unwrap();
        assert!(Config::load(&path).is_err());
    }
}
