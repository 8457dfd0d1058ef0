//! 加权倒数排名融合 (Weighted Reciprocal Rank Fusion)
//!
//! score(d) = Σ w_L / (k + rank_L(d) + 1)

use hybridrag_core::{Document, HybridRagError, RankedList, Result, DEFAULT_K_CONST};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// 带权重的排名列表
#[derive(Debug, Clone)]
pub struct WeightedList {
    pub list: RankedList,
    pub weight: f64,
}

impl WeightedList {
    pub fn new(list: RankedList, weight: f64) -> Self {
        Self { list, weight }
    }
}

/// 某个来源对融合分数的贡献
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contribution {
    pub source: String,
    pub rank: usize,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusedEntry {
    pub document: Document,
    pub score: f64,
    pub contributions: Vec<Contribution>,
}

impl FusedEntry {
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.contributions.iter().map(|c| c.source.as_str())
    }
}

/// 融合结果，按分数降序
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FusedResult {
    pub entries: Vec<FusedEntry>,
}

impl FusedResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn documents(&self) -> Vec<&Document> {
        self.entries.iter().map(|e| &e.document).collect()
    }

    pub fn get(&self, id: &str) -> Option<&FusedEntry> {
        self.entries.iter().find(|e| e.document.id == id)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RankFusion {
    k_const: f64,
}

impl Default for RankFusion {
    fn default() -> Self {
        Self {
            k_const: DEFAULT_K_CONST,
        }
    }
}

impl RankFusion {
    pub fn new(k_const: f64) -> Result<Self> {
        if !k_const.is_finite() || k_const < 0.0 {
            return Err(HybridRagError::InvalidArgument(format!(
                "k_const must be a non-negative number, got {}",
                k_const
            )));
        }
        Ok(Self { k_const })
    }

    pub fn k_const(&self) -> f64 {
        self.k_const
    }

    /// Fuses `lists` into at most `top_n` entries.
    ///
    /// Ties keep first-encounter order, scanning lists left to right and each
    /// list top to bottom. A document repeated inside one list only counts at
    /// its best rank in that list.
    pub fn fuse(&self, lists: &[WeightedList], top_n: usize) -> Result<FusedResult> {
        validate(lists, top_n)?;

        let mut slots: HashMap<&str, usize> = HashMap::new();
        let mut entries: Vec<FusedEntry> = Vec::new();

        for weighted in lists {
            let source = weighted.list.source.as_str();
            let mut seen_in_list: HashSet<&str> = HashSet::new();

            for (rank, doc) in weighted.list.ranked() {
                if !seen_in_list.insert(doc.id.as_str()) {
                    continue;
                }

                let score = weighted.weight / (self.k_const + rank as f64 + 1.0);
                let contribution = Contribution {
                    source: source.to_string(),
                    rank,
                    score,
                };

                match slots.get(doc.id.as_str()) {
                    Some(&slot) => {
                        let entry = &mut entries[slot];
                        entry.score += score;
                        entry.contributions.push(contribution);
                    }
                    None => {
                        slots.insert(doc.id.as_str(), entries.len());
                        entries.push(FusedEntry {
                            document: doc.clone(),
                            score,
                            contributions: vec![contribution],
                        });
                    }
                }
            }
        }

        // sort_by 是稳定排序，并列时保留首次出现的顺序
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        entries.truncate(top_n);

        Ok(FusedResult { entries })
    }
}

/// Fuses with the default smoothing constant (60).
pub fn fuse(lists: &[WeightedList], top_n: usize) -> Result<FusedResult> {
    RankFusion::default().fuse(lists, top_n)
}

fn validate(lists: &[WeightedList], top_n: usize) -> Result<()> {
    if lists.is_empty() {
        return Err(HybridRagError::InvalidArgument(
            "at least one ranked list is required".to_string(),
        ));
    }
    if top_n == 0 {
        return Err(HybridRagError::InvalidArgument("top_n must be positive".to_string()));
    }
    for weighted in lists {
        if !weighted.weight.is_finite() || weighted.weight < 0.0 {
            return Err(HybridRagError::InvalidArgument(format!(
                "weight for list '{}' must be a non-negative number, got {}",
                weighted.list.source, weighted.weight
            )));
        }
    }
    Ok(())
}
