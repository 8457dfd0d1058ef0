//! 文本切分

use hybridrag_ai::TiktokenCounter;
use hybridrag_core::{ChunkingConfig, HybridRagError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub index: usize,
    pub content: String,
}

/// 按 token 窗口切分文本，相邻窗口重叠 `overlap` 个 token
pub struct Chunker {
    counter: TiktokenCounter,
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(HybridRagError::InvalidArgument(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, chunk_size
            )));
        }

        Ok(Self {
            counter: TiktokenCounter::new("cl100k_base")?,
            chunk_size,
            overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.chunk_size, config.overlap)
    }

    pub fn chunk_text(&self, text: &str) -> Result<Vec<Chunk>> {
        Ok(self
            .counter
            .windows(text, self.chunk_size, self.overlap)?
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk { index, content })
            .collect())
    }
}
