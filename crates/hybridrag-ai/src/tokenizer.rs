//! Token 计数与切分

use hybridrag_core::{HybridRagError, Result};
use std::ops::Range;
use tiktoken_rs::{cl100k_base, o200k_base, CoreBPE};

/// Token 计数器 Trait
pub trait TokenCounter: Send + Sync {
    /// 计算文本的 token 数量
    fn count(&self, text: &str) -> usize;
}

/// Tiktoken 计数器
pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn new(encoder: &str) -> Result<Self> {
        let bpe = match encoder {
            "o200k_base" => o200k_base(),
            _ => cl100k_base(),
        }
        .map_err(|e| HybridRagError::Config(format!("加载分词器失败: {}", e)))?;

        Ok(Self { bpe })
    }

    pub fn for_model(model: &str) -> Result<Self> {
        let encoder = if model.starts_with("gpt-4o") || model.starts_with("o1") {
            "o200k_base"
        } else {
            "cl100k_base"
        };
        Self::new(encoder)
    }

    /// Byte offset in `text` where each token starts, plus a final entry for
    /// `text.len()`. A multi-byte character may span several tokens, so
    /// interior offsets are not always char boundaries.
    fn token_offsets(&self, text: &str) -> Result<Vec<usize>> {
        let tokens = self.bpe.encode_with_special_tokens(text);
        let mut offsets = Vec::with_capacity(tokens.len() + 1);
        let mut position = 0;
        offsets.push(position);
        for bytes in self.bpe._decode_native_and_split(tokens) {
            position += bytes.len();
            offsets.push(position);
        }

        if position != text.len() {
            return Err(HybridRagError::Unknown(format!(
                "token bytes cover {} of {} input bytes",
                position,
                text.len()
            )));
        }
        Ok(offsets)
    }

    /// Byte ranges of windows of at most `size` tokens where consecutive
    /// windows share `overlap` tokens. Every boundary is moved back to the
    /// start of the character it falls in, so the ranges are contiguous and
    /// together cover the whole text.
    pub fn window_ranges(
        &self,
        text: &str,
        size: usize,
        overlap: usize,
    ) -> Result<Vec<Range<usize>>> {
        if size == 0 || overlap >= size {
            return Err(HybridRagError::InvalidArgument(format!(
                "window overlap ({}) must be smaller than window size ({})",
                overlap, size
            )));
        }

        let offsets = self.token_offsets(text)?;
        let token_count = offsets.len() - 1;
        let step = size - overlap;
        let mut ranges = Vec::new();
        let mut start = 0;

        while start < token_count {
            let end = (start + size).min(token_count);
            let range =
                floor_char_boundary(text, offsets[start])..floor_char_boundary(text, offsets[end]);
            if !range.is_empty() {
                ranges.push(range);
            }
            if end == token_count {
                break;
            }
            start += step;
        }

        Ok(ranges)
    }

    /// Splits `text` into windows of at most `size` tokens where consecutive
    /// windows share `overlap` tokens. Requires `overlap < size`.
    pub fn windows(&self, text: &str, size: usize, overlap: usize) -> Result<Vec<String>> {
        Ok(self
            .window_ranges(text, size, overlap)?
            .into_iter()
            .map(|range| &text[range])
            .filter(|piece| !piece.trim().is_empty())
            .map(str::to_string)
            .collect())
    }

    /// Truncates `text` to at most `max_tokens` tokens, cutting at a
    /// character boundary.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> Result<String> {
        let offsets = self.token_offsets(text)?;
        if offsets.len() - 1 <= max_tokens {
            return Ok(text.to_string());
        }
        if max_tokens == 0 {
            return Ok(String::new());
        }

        let end = floor_char_boundary(text, offsets[max_tokens]);
        if end == 0 {
            return Err(HybridRagError::InvalidArgument(format!(
                "a budget of {} tokens cannot hold the first character",
                max_tokens
            )));
        }
        Ok(text[..end].to_string())
    }
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}
