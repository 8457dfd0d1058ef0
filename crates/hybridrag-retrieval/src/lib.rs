//! hybridrag Retrieval - 混合检索
//!
//! 从结构化与非结构化两个向量存储并发检索，用加权倒数排名融合合并结果，
//! 再交给大模型生成答案。

pub mod ai_adapter;
pub mod chunk;
pub mod embedding;
pub mod fusion;
pub mod generator;
pub mod ingest;
pub mod pipeline;
pub mod retriever;

pub use ai_adapter::*;
pub use chunk::*;
pub use embedding::*;
pub use fusion::*;
pub use generator::*;
pub use ingest::*;
pub use pipeline::*;
pub use retriever::*;
