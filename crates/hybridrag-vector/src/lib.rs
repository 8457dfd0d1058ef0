//! hybridrag Vector - 向量存储抽象层
//!
//! 提供统一的向量存储接口，支持多种后端：
//! - 内存 (测试和开发)
//! - pgvector (PostgreSQL 扩展，结构化存储)
//! - Qdrant (托管向量检索集群)

pub mod store;
pub mod types;

pub use store::*;
pub use types::*;
