use anyhow::Result;
use clap::{Parser, Subcommand};
use kb_retrieval::commands::{load_config, run_ingest, run_query, show_config, write_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kb-retrieval")]
#[command(about = "Local knowledge-base ingestion and semantic retrieval")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml (defaults to the per-user config directory)
    #[arg(long, global = true, env = "KB_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index every document in the content directory
    Ingest {
        /// Directory of Markdown and text files to ingest
        #[arg(long)]
        content_dir: Option<PathBuf>,
        /// Directory for the database, index snapshot and manifest
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Retrieve the chunks most relevant to a query
    Query {
        /// Query text
        text: String,
        /// Number of results to return
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// Write or display the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config_dir.as_deref())?;

    match cli.command {
        Commands::Ingest {
            content_dir,
            output_dir,
        } => {
            run_ingest(config, content_dir, output_dir).await?;
        }
        Commands::Query { text, top_k } => {
            run_query(config, &text, top_k).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config(&config)?;
            } else {
                write_config(&config)?;
            }
        }
    }

    Ok(())
}
