//! hybridrag Core - 核心类型和抽象
//!
//! 提供文档模型、错误处理、配置等基础功能。

pub mod config;
pub mod document;
pub mod error;
pub mod message;

pub use config::*;
pub use document::*;
pub use error::*;
pub use message::*;
