//! Init 命令

use anyhow::{bail, Result};
use hybridrag_core::Config;
use std::path::Path;

pub async fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        );
    }

    // 创建默认配置
    let config = Config::default();
    config.save(path)?;

    println!("Configuration initialized at: {}", path.display());
    println!("\nDefault configuration:");
    println!(
        "  Fusion: k={} weights={}/{} top_n={}",
        config.fusion.k_const,
        config.fusion.structured_weight,
        config.fusion.unstructured_weight,
        config.fusion.top_n
    );
    println!(
        "  Embedding: {} ({} dims)",
        config.embedding.model, config.embedding.dimensions
    );
    println!("  Generation: {}", config.generation.model);
    println!("\nSet DATABASE_URL, QDRANT_URL and OPENAI_API_KEY (or edit the file) before ingesting.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        run(&path, false).await.unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.fusion.top_n, 5);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        run(&path, false).await.unwrap();
        assert!(run(&path, false).await.is_err());
        assert!(run(&path, true).await.is_ok());
    }
}
