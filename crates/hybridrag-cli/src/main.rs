//! hybridrag CLI - 命令行工具

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod context;

#[derive(Parser)]
#[command(name = "hybridrag")]
#[command(about = "Hybrid retrieval over product reviews with weighted rank fusion", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file path (default: ~/.hybridrag/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Create the pgvector table and Qdrant collection if missing
    Setup,
    /// Load a review CSV into both stores
    Ingest {
        /// Path to the CSV file
        #[arg(long)]
        csv: PathBuf,
    },
    /// Ask a question against both stores
    Query {
        /// Question text
        text: String,
        /// Number of fused results
        #[arg(long)]
        top_n: Option<usize>,
        /// Keep going when one store fails
        #[arg(long)]
        lenient: bool,
        /// Print fused results without generating an answer
        #[arg(long)]
        no_generate: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Fuse ranked lists read from a JSON file
    Fuse {
        /// Path to the JSON input
        #[arg(short, long)]
        input: PathBuf,
        /// Number of fused results
        #[arg(long)]
        top_n: Option<usize>,
        /// Smoothing constant
        #[arg(short, long)]
        k: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hybridrag=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(hybridrag_core::Config::default_path);

    match cli.command {
        Commands::Init { force } => {
            commands::init::run(&config_path, force).await?;
        }
        Commands::Setup => {
            commands::setup::run(&config_path).await?;
        }
        Commands::Ingest { csv } => {
            commands::ingest::run(&config_path, &csv).await?;
        }
        Commands::Query {
            text,
            top_n,
            lenient,
            no_generate,
            json,
        } => {
            let options = commands::query::QueryOptions {
                top_n,
                lenient,
                generate: !no_generate,
                json,
            };
            commands::query::run(&config_path, &text, options).await?;
        }
        Commands::Fuse { input, top_n, k } => {
            commands::fuse::run(&config_path, &input, top_n, k).await?;
        }
    }

    Ok(())
}
