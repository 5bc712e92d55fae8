use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::RetrievalError;
use crate::config::{Config, get_config_dir};
use crate::database::Database;
use crate::embeddings::{Embedder, EmbeddingProvider};
use crate::index::{SharedIndex, VectorIndex};
use crate::ingest::{IngestReport, Ingestor};
use crate::retriever::{RetrievalResult, Retriever};

const PREVIEW_CHARS: usize = 160;

/// Load `config.toml` from `config_dir` (or the per-user default) and apply environment overrides
#[inline]
pub fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    let config_dir = match config_dir {
        Some(dir) => dir.to_path_buf(),
        None => get_config_dir()?,
    };

    let mut config = Config::load(&config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;

    Ok(config)
}

async fn open_database(config: &Config) -> Result<Database> {
    Database::initialize_in_dir(&config.output_dir(), &config.paths.database_name)
        .await
        .context("Failed to initialize database")
}

/// Ingest the content directory and rebuild the index snapshot
#[inline]
pub async fn run_ingest(
    mut config: Config,
    content_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
) -> Result<IngestReport> {
    if content_dir.is_some() {
        config.paths.content_dir = content_dir;
    }
    if output_dir.is_some() {
        config.paths.output_dir = output_dir;
    }

    let database = open_database(&config).await?;
    let provider = EmbeddingProvider::select(&config);
    let ingestor = Ingestor::new(&config, &database, &provider)?;

    let report = ingestor.run(&config.content_dir()).await?;
    database.close().await;

    println!(
        "{} Ingested {} chunks from {} documents",
        style("✓").green(),
        style(report.chunks).cyan(),
        style(report.documents).cyan()
    );
    println!("  Embedding: {}", style(report.embedding).cyan());
    println!(
        "  Snapshot: {} in {}",
        style(&report.snapshot).cyan(),
        style(config.index_dir().display()).dim()
    );
    println!("  Database: {}", style(config.database_path().display()).dim());

    Ok(report)
}

/// Answer a query from the saved snapshot.
///
/// A snapshot that was never built is reported with a hint rather than as an error.
#[inline]
pub async fn run_query(config: Config, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
    let index = match VectorIndex::load(&config.index_dir(), config.snapshot_name()) {
        Ok(index) => index,
        Err(RetrievalError::IndexNotFound { name, dir }) => {
            warn!("Index snapshot '{}' not found in {}", name, dir);
            eprintln!(
                "{} No index snapshot '{}' found. Run {} first.",
                style("!").yellow(),
                name,
                style("kb-retrieval ingest").bold()
            );
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).context("Failed to load index snapshot"),
    };

    let database = open_database(&config).await?;
    let provider = EmbeddingProvider::select(&config);
    if index.dimension() != provider.dimension() {
        warn!(
            "Index dimension {} differs from configured dimension {}",
            index.dimension(),
            provider.dimension()
        );
    }

    let retriever = Retriever::new(SharedIndex::new(index), database, provider);
    info!("Querying snapshot '{}' for top {}", config.snapshot_name(), top_k);
    let results = retriever.retrieve(query, top_k).await?;

    print_results(&results);
    Ok(results)
}

fn print_results(results: &[RetrievalResult]) {
    if results.is_empty() {
        println!("{}", style("No results").yellow());
        return;
    }

    for (rank, result) in results.iter().enumerate() {
        println!(
            "{} {} {}",
            style(format!("{}.", rank + 1)).bold(),
            style(result.title.as_deref().unwrap_or(&result.source)).cyan(),
            style(format!("(similarity {:.3})", result.similarity())).dim()
        );
        println!(
            "   {} #{}",
            style(&result.source).dim(),
            result.position
        );
        match result.chunk.as_deref() {
            Some(chunk) => println!("   {}", preview(chunk)),
            None => println!("   {}", style("<chunk missing from store>").red()),
        }
    }
}

fn preview(text: &str) -> String {
    let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

/// Write the configuration file with the current (or default) settings
#[inline]
pub fn write_config(config: &Config) -> Result<()> {
    config.save().context("Failed to save configuration")?;

    eprintln!(
        "{} Configuration written to {}",
        style("✓").green(),
        style(config.config_file_path().display()).dim()
    );
    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!("  Overlap: {}", style(config.chunking.chunk_overlap).cyan());

    eprintln!();
    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!(
        "  Prefer Model: {}",
        style(config.embedding.prefer_model).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    match config.ollama.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("Paths:").bold().yellow());
    eprintln!(
        "  Content: {}",
        style(config.content_dir().display()).cyan()
    );
    eprintln!("  Output: {}", style(config.output_dir().display()).cyan());
    eprintln!(
        "  Database: {}",
        style(config.database_path().display()).cyan()
    );
    eprintln!(
        "  Snapshot: {} in {}",
        style(config.snapshot_name()).cyan(),
        style(config.index_dir().display()).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}
