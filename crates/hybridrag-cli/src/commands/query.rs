//! Query 命令

use anyhow::Result;
use hybridrag_core::FailurePolicy;
use hybridrag_retrieval::{FusedEntry, HybridSearchPipeline, LlmAnswerGenerator};
use std::path::Path;
use std::sync::Arc;

use crate::context;

pub struct QueryOptions {
    pub top_n: Option<usize>,
    pub lenient: bool,
    pub generate: bool,
    pub json: bool,
}

pub async fn run(config_path: &Path, text: &str, options: QueryOptions) -> Result<()> {
    let mut config = context::load_config(config_path)?;
    if let Some(top_n) = options.top_n {
        config.fusion.top_n = top_n;
    }
    if options.lenient {
        config.retrieval.failure_policy = FailurePolicy::Lenient;
    }

    let pipeline = HybridSearchPipeline::from_config(
        &config,
        context::embedding_provider(&config)?,
        context::structured_store(&config).await?,
        context::unstructured_store(&config).await?,
    )?;

    if !options.generate {
        let fused = pipeline.retrieve(text).await?;
        if options.json {
            println!("{}", serde_json::to_string_pretty(&fused)?);
        } else {
            print_sources(&fused.entries);
        }
        return Ok(());
    }

    let generator = LlmAnswerGenerator::new(context::chat_provider(&config)?, &config.generation)?;
    let answer = pipeline
        .with_generator(Arc::new(generator))
        .answer(text)
        .await?;

    if options.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("{}\n", answer.answer);
        print_sources(&answer.sources);
    }

    Ok(())
}

fn print_sources(entries: &[FusedEntry]) {
    if entries.is_empty() {
        println!("No matching reviews.");
        return;
    }

    for (i, entry) in entries.iter().enumerate() {
        let sources: Vec<&str> = entry.sources().collect();
        println!(
            "[{}] {} score={:.5} ({})",
            i + 1,
            entry.document.id,
            entry.score,
            sources.join("+")
        );
        println!("    {}", preview(&entry.document.content, 160));
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("a\n  b", 10), "a b");
        assert_eq!(preview("abcdef", 3), "abc...");
    }
}
