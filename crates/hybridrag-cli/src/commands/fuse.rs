//! Fuse 命令：离线融合 JSON 文件中的排名列表
//!
//! 输入格式:
//! ```json
//! { "lists": [ { "source": "pg", "weight": 0.5,
//!                "documents": [ { "id": "doc1", "content": "...", "rank": 0 } ] } ] }
//! ```
//! `rank` 可省略，省略时按数组顺序排名。

use anyhow::{Context, Result};
use hybridrag_core::{Document, RankedList};
use hybridrag_retrieval::{FusedResult, RankFusion, WeightedList};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::context;

#[derive(Debug, Deserialize)]
struct FuseInput {
    lists: Vec<InputList>,
}

#[derive(Debug, Deserialize)]
struct InputList {
    source: String,
    weight: f64,
    documents: Vec<InputDocument>,
}

#[derive(Debug, Deserialize)]
struct InputDocument {
    id: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    rank: Option<usize>,
}

impl InputList {
    fn into_weighted(self) -> Result<WeightedList> {
        let explicit = self.documents.iter().any(|d| d.rank.is_some());

        let list = if explicit {
            let entries = self
                .documents
                .into_iter()
                .map(|d| {
                    let rank = d
                        .rank
                        .with_context(|| format!("list '{}': document '{}' has no rank", self.source, d.id))?;
                    Ok((rank, d.into_document()))
                })
                .collect::<Result<Vec<_>>>()?;
            RankedList::from_ranked(self.source, entries)?
        } else {
            RankedList::new(
                self.source,
                self.documents.into_iter().map(InputDocument::into_document).collect(),
            )
        };

        Ok(WeightedList::new(list, self.weight))
    }
}

impl InputDocument {
    fn into_document(self) -> Document {
        Document {
            id: self.id,
            content: self.content,
            metadata: self.metadata,
        }
    }
}

pub async fn run(config_path: &Path, input: &Path, top_n: Option<usize>, k: Option<f64>) -> Result<()> {
    let config = context::load_config(config_path)?;
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("reading {}", input.display()))?;

    let fused = fuse_json(
        &raw,
        k.unwrap_or(config.fusion.k_const),
        top_n.unwrap_or(config.fusion.top_n),
    )?;
    println!("{}", serde_json::to_string_pretty(&fused)?);
    Ok(())
}

fn fuse_json(raw: &str, k_const: f64, top_n: usize) -> Result<FusedResult> {
    let input: FuseInput = serde_json::from_str(raw).context("parsing fuse input")?;
    let lists = input
        .lists
        .into_iter()
        .map(InputList::into_weighted)
        .collect::<Result<Vec<_>>>()?;

    Ok(RankFusion::new(k_const)?.fuse(&lists, top_n)?)
}
