//! 统一错误处理

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HybridRagError {
    /// 调用方传入的参数结构上不合法 (空列表、负权重、top_n 为 0 等)
    #[error("参数错误: {0}")]
    InvalidArgument(String),

    /// 显式排名不连续或重复
    #[error("输入格式错误: {0}")]
    MalformedInput(String),

    #[error("配置错误: {0}")]
    Config(String),

    #[error("AI 提供商错误: {0}")]
    AIProvider(String),

    #[error("嵌入错误: {0}")]
    Embedding(String),

    #[error("请求被限流: {0}")]
    Throttled(String),

    #[error("向量存储错误: {0}")]
    VectorStore(String),

    #[error("数据导入错误: {0}")]
    Ingest(String),

    #[error("超时: {0}")]
    Timeout(String),

    #[error("HTTP 请求错误: {0}")]
    Http(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("未知错误: {0}")]
    Unknown(String),
}

impl HybridRagError {
    /// Caller mistakes, as opposed to failures of an upstream collaborator.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            HybridRagError::InvalidArgument(_) | HybridRagError::MalformedInput(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, HybridRagError>;
