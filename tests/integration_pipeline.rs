#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end tests for ingestion, snapshot persistence and retrieval

use std::fs;

use tempfile::TempDir;

use kb_retrieval::RetrievalError;
use kb_retrieval::config::Config;
use kb_retrieval::database::Database;
use kb_retrieval::embeddings::{EmbeddingKind, EmbeddingProvider, chunk_text};
use kb_retrieval::index::{SharedIndex, VectorIndex};
use kb_retrieval::ingest::Ingestor;
use kb_retrieval::retriever::Retriever;

const FOX: &str = "the quick brown fox jumps over the lazy dog";

/// Config rooted in a temp dir with the TF-IDF fallback and small windows
fn create_test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::with_base_dir(temp_dir.path());
    config.chunking.chunk_size = 4;
    config.chunking.chunk_overlap = 1;
    config.embedding.dimension = 32;
    config.embedding.prefer_model = false;
    config
}

async fn ingest_fox(config: &Config) -> anyhow::Result<Database> {
    fs::create_dir_all(config.content_dir())?;
    fs::write(config.content_dir().join("a.md"), FOX)?;

    let database =
        Database::initialize_in_dir(&config.output_dir(), &config.paths.database_name).await?;
    let provider = EmbeddingProvider::select(config);
    Ingestor::new(config, &database, &provider)?
        .run(&config.content_dir())
        .await?;

    Ok(database)
}

#[test]
fn fox_text_splits_into_three_windows() -> anyhow::Result<()> {
    let chunks = chunk_text(FOX, 4, 1)?;

    assert_eq!(
        chunks,
        vec!["the quick brown fox", "fox jumps over the", "the lazy dog"]
    );
    Ok(())
}

#[tokio::test]
async fn fox_jumps_ranks_its_chunk_first_after_reload() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config = create_test_config(&temp_dir);
    let database = ingest_fox(&config).await?;

    // Fresh process view: load the snapshot from disk
    let index = VectorIndex::load(&config.index_dir(), config.snapshot_name())?;
    assert_eq!(index.len(), 3);
    assert_eq!(
        index.profile().map(|p| p.kind()),
        Some(EmbeddingKind::TfIdf)
    );

    let provider = EmbeddingProvider::select(&config);
    let retriever = Retriever::new(SharedIndex::new(index), database, provider);
    let results = retriever.retrieve("fox jumps", 3).await?;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].position, 1);
    assert_eq!(results[0].chunk.as_deref(), Some("fox jumps over the"));
    assert_eq!(results[0].title.as_deref(), Some("a"));
    assert!(results[0].similarity() > results[1].similarity());

    Ok(())
}

#[tokio::test]
async fn never_saved_snapshot_is_not_found() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config = create_test_config(&temp_dir);
    ingest_fox(&config).await?;

    let result = VectorIndex::load(&config.index_dir(), "does-not-exist");

    assert!(matches!(result, Err(RetrievalError::IndexNotFound { .. })));
    Ok(())
}

#[tokio::test]
async fn oversized_query_vector_is_a_dimension_mismatch() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config = create_test_config(&temp_dir);
    ingest_fox(&config).await?;

    let index = VectorIndex::load(&config.index_dir(), config.snapshot_name())?;
    let query = vec![0.1; index.dimension() + 1];

    assert!(matches!(
        index.query(&query, 3),
        Err(RetrievalError::DimensionMismatch {
            expected: 32,
            actual: 33
        })
    ));
    Ok(())
}

#[tokio::test]
async fn empty_content_yields_empty_but_loadable_snapshot() -> anyhow::Result<()> {
    let temp_dir = TempDir::new()?;
    let config = create_test_config(&temp_dir);
    fs::create_dir_all(config.content_dir())?;

    let database =
        Database::initialize_in_dir(&config.output_dir(), &config.paths.database_name).await?;
    let provider = EmbeddingProvider::select(&config);
    let report = Ingestor::new(&config, &database, &provider)?
        .run(&config.content_dir())
        .await?;
    assert_eq!(report.chunks, 0);

    let index = VectorIndex::load(&config.index_dir(), config.snapshot_name())?;
    let retriever = Retriever::new(SharedIndex::new(index), database, provider);
    assert!(retriever.retrieve("fox", 5).await?.is_empty());

    Ok(())
}
