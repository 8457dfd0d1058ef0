//! hybridrag AI - 模型提供商抽象层
//!
//! 提供聊天补全与嵌入接口，默认实现兼容 OpenAI HTTP 协议。

pub mod providers;
pub mod tokenizer;
pub mod types;

pub use providers::*;
pub use tokenizer::*;
pub use types::*;
