//! Ingest 命令

use anyhow::{Context, Result};
use hybridrag_retrieval::{Chunker, ReviewIngestor};
use std::path::Path;

use crate::context;

pub async fn run(config_path: &Path, csv: &Path) -> Result<()> {
    let config = context::load_config(config_path)?;

    let stores = vec![
        context::structured_store(&config).await?,
        context::unstructured_store(&config).await?,
    ];
    for store in &stores {
        store.setup().await?;
    }

    let ingestor = ReviewIngestor::new(
        config.ingest.clone(),
        Chunker::from_config(&config.chunking)?,
        context::embedding_provider(&config)?,
        stores,
    );

    let report = ingestor
        .ingest_path(csv)
        .await
        .with_context(|| format!("ingesting {}", csv.display()))?;

    println!(
        "Read {} rows ({} skipped), wrote {} chunks",
        report.rows_read, report.rows_skipped, report.chunks
    );
    for (store, count) in &report.written {
        println!("  {}: {}", store, count);
    }

    Ok(())
}
