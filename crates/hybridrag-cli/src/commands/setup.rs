//! Setup 命令

use anyhow::Result;
use std::path::Path;

use crate::context;

pub async fn run(config_path: &Path) -> Result<()> {
    let config = context::load_config(config_path)?;

    for store in [
        context::structured_store(&config).await?,
        context::unstructured_store(&config).await?,
    ] {
        let outcome = store.setup().await?;
        println!("{}: {}", store.name(), outcome);
    }

    Ok(())
}
