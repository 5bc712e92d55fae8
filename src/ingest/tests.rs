use super::*;
use crate::index::snapshot;
use anyhow::Result;
use tempfile::TempDir;

struct Workspace {
    _temp_dir: TempDir,
    config: Config,
    database: Database,
    provider: EmbeddingProvider,
}

async fn workspace() -> Result<Workspace> {
    let temp_dir = TempDir::new()?;

    let mut config = Config::with_base_dir(temp_dir.path());
    config.chunking.chunk_size = 4;
    config.chunking.chunk_overlap = 1;
    config.embedding.dimension = 32;
    config.embedding.prefer_model = false;
    fs::create_dir_all(config.content_dir())?;

    let database =
        Database::initialize_in_dir(&config.output_dir(), &config.paths.database_name).await?;
    let provider = EmbeddingProvider::select(&config);

    Ok(Workspace {
        _temp_dir: temp_dir,
        config,
        database,
        provider,
    })
}

#[tokio::test]
async fn run_persists_documents_chunks_and_snapshot() -> Result<()> {
    let ws = workspace().await?;
    fs::write(
        ws.config.content_dir().join("a.md"),
        "---\ntitle: Animals\n---\nthe quick brown fox jumps over the lazy dog\n",
    )?;

    let ingestor = Ingestor::new(&ws.config, &ws.database, &ws.provider)?;
    let report = ingestor.run(&ws.config.content_dir()).await?;

    assert_eq!(
        report,
        IngestReport {
            documents: 1,
            chunks: 3,
            embedding: EmbeddingKind::TfIdf,
            snapshot: "v1".to_string(),
        }
    );

    let documents = ws.database.list_documents().await?;
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].title.as_deref(), Some("Animals"));
    assert_eq!(
        ws.database.get_chunk_text(documents[0].id, 1).await?.as_deref(),
        Some("fox jumps over the")
    );

    let index = VectorIndex::load(&ws.config.index_dir(), "v1")?;
    assert_eq!(index.len(), 3);
    assert_eq!(index.metadata()[2].position, 2);
    assert_eq!(index.profile().map(|p| p.kind()), Some(EmbeddingKind::TfIdf));

    Ok(())
}

#[tokio::test]
async fn manifest_matches_report() -> Result<()> {
    let ws = workspace().await?;
    fs::write(ws.config.content_dir().join("one.txt"), "alpha beta gamma delta epsilon")?;
    fs::write(ws.config.content_dir().join("two.md"), "# Two\n\nzeta eta")?;

    let ingestor = Ingestor::new(&ws.config, &ws.database, &ws.provider)?;
    let report = ingestor.run(&ws.config.content_dir()).await?;

    let manifest: IngestReport =
        serde_json::from_str(&fs::read_to_string(ws.config.manifest_path())?)?;
    assert_eq!(manifest, report);
    assert_eq!(manifest.documents, 2);

    Ok(())
}

#[tokio::test]
async fn reingesting_is_idempotent() -> Result<()> {
    let ws = workspace().await?;
    let path = ws.config.content_dir().join("a.md");
    fs::write(&path, "one two three four five six seven")?;

    let ingestor = Ingestor::new(&ws.config, &ws.database, &ws.provider)?;
    ingestor.run(&ws.config.content_dir()).await?;

    fs::write(&path, "one two three")?;
    let report = ingestor.run(&ws.config.content_dir()).await?;

    assert_eq!(report.chunks, 1);
    assert_eq!(ws.database.count_documents().await?, 1);
    assert_eq!(ws.database.count_chunks().await?, 1);

    Ok(())
}

#[tokio::test]
async fn empty_corpus_still_saves_snapshot() -> Result<()> {
    let ws = workspace().await?;

    let ingestor = Ingestor::new(&ws.config, &ws.database, &ws.provider)?;
    let report = ingestor.run(&ws.config.content_dir()).await?;

    assert_eq!(report.documents, 0);
    assert_eq!(report.chunks, 0);
    assert!(snapshot::exists(&ws.config.index_dir(), "v1"));

    let index = VectorIndex::load(&ws.config.index_dir(), "v1")?;
    assert!(index.is_empty());
    assert_eq!(index.dimension(), 32);

    Ok(())
}

#[tokio::test]
async fn run_into_publishes_rebuilt_index() -> Result<()> {
    let ws = workspace().await?;
    fs::write(ws.config.content_dir().join("a.md"), "alpha beta gamma delta epsilon")?;

    let shared = SharedIndex::new(VectorIndex::new(32));
    let ingestor = Ingestor::new(&ws.config, &ws.database, &ws.provider)?;
    ingestor.run_into(&ws.config.content_dir(), &shared).await?;

    assert_eq!(shared.current().len(), 2);

    Ok(())
}

#[tokio::test]
async fn invalid_chunking_is_rejected_up_front() -> Result<()> {
    let mut ws = workspace().await?;
    ws.config.chunking.chunk_overlap = 4;

    let result = Ingestor::new(&ws.config, &ws.database, &ws.provider);
    assert!(matches!(result, Err(crate::RetrievalError::ConfigInvalid(_))));

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn embedding_failure_leaves_store_untouched() -> Result<()> {
    use crate::config::OllamaConfig;
    use crate::embeddings::OllamaEmbedder;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ws = workspace().await?;
    fs::write(
        ws.config.content_dir().join("a.md"),
        "the quick brown fox jumps over the lazy dog",
    )?;

    let ollama = OllamaConfig {
        host: server.address().ip().to_string(),
        port: server.address().port(),
        ..OllamaConfig::default()
    };
    let provider = EmbeddingProvider::Model(
        OllamaEmbedder::new(&ollama, 32)?
            .with_retry_attempts(1)
            .with_backoff_base(Duration::from_millis(1)),
    );

    let ingestor = Ingestor::new(&ws.config, &ws.database, &provider)?;
    let result = ingestor.run(&ws.config.content_dir()).await;

    assert!(matches!(
        result,
        Err(crate::RetrievalError::EmbeddingProviderFailure(_))
    ));
    assert_eq!(ws.database.count_documents().await?, 0);
    assert_eq!(ws.database.count_chunks().await?, 0);
    assert!(!snapshot::exists(&ws.config.index_dir(), ws.config.snapshot_name()));

    Ok(())
}
