//! 文档与排名列表

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{HybridRagError, Result};

/// 检索得到的文档
///
/// `id` 是跨列表去重的依据，内容相同但 id 不同的文档视为不同文档。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|s| s.as_str())
    }
}

/// 单个检索器针对单次查询返回的有序结果
///
/// 排名由位置隐式给出，第 0 个元素最相关。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedList {
    pub source: String,
    pub documents: Vec<Document>,
}

impl RankedList {
    pub fn new(source: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            source: source.into(),
            documents,
        }
    }

    pub fn empty(source: impl Into<String>) -> Self {
        Self::new(source, Vec::new())
    }

    /// Builds a list from explicitly ranked entries. Entries may arrive in any
    /// order but their ranks must form exactly `0..len`.
    pub fn from_ranked(
        source: impl Into<String>,
        mut entries: Vec<(usize, Document)>,
    ) -> Result<Self> {
        let source = source.into();
        entries.sort_by_key(|(rank, _)| *rank);

        for (expected, (rank, doc)) in entries.iter().enumerate() {
            if *rank != expected {
                return Err(HybridRagError::MalformedInput(format!(
                    "list '{}': document '{}' has rank {} where rank {} was expected",
                    source, doc.id, rank, expected
                )));
            }
        }

        Ok(Self {
            source,
            documents: entries.into_iter().map(|(_, doc)| doc).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// (rank, document) pairs in rank order.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &Document)> {
        self.documents.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str) -> Document {
        Document::new(id, format!("content of {}", id))
    }

    #[test]
    fn test_document_metadata() {
        let d = doc("a").with_metadata("collection", "reviews");
        assert_eq!(d.metadata("collection"), Some("reviews"));
        assert_eq!(d.metadata("missing"), None);
    }

    #[test]
    fn test_ranked_positions_are_implicit() {
        let list = RankedList::new("pg", vec![doc("a"), doc("b")]);
        let ranks: Vec<(usize, &str)> = list.ranked().map(|(r, d)| (r, d.id.as_str())).collect();
        assert_eq!(ranks, vec![(0, "a"), (1, "b")]);
    }

    #[test]
    fn test_from_ranked_reorders_by_rank() {
        let list = RankedList::from_ranked("pg", vec![(1, doc("b")), (0, doc("a"))]).unwrap();
        assert_eq!(list.documents[0].id, "a");
        assert_eq!(list.documents[1].id, "b");
    }

    #[test]
    fn test_from_ranked_rejects_gap() {
        let err = RankedList::from_ranked("pg", vec![(0, doc("a")), (2, doc("b"))]).unwrap_err();
        assert!(matches!(err, HybridRagError::MalformedInput(_)));
    }

    #[test]
    fn test_from_ranked_rejects_duplicate_rank() {
        let err = RankedList::from_ranked("pg", vec![(0, doc("a")), (0, doc("b"))]).unwrap_err();
        assert!(matches!(err, HybridRagError::MalformedInput(_)));
    }

    #[test]
    fn test_from_ranked_rejects_one_based() {
        let err = RankedList::from_ranked("pg", vec![(1, doc("a"))]).unwrap_err();
        assert!(err.is_caller_error());
    }
}
