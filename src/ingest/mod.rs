// Ingestion module
// Reads the content directory, embeds its chunks, persists them, and rebuilds the index snapshot

pub mod reader;

#[cfg(test)]
mod tests;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::Result;
use crate::config::Config;
use crate::database::Database;
use crate::embeddings::{Chunker, EmbeddingKind, EmbeddingProvider};
use crate::index::{ChunkMetadata, SharedIndex, VectorIndex};

pub use reader::{
    SourceDocument, list_source_files, markdown_to_text, read_source, split_front_matter,
};

/// Summary of one ingestion run, also written as `manifest.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub embedding: EmbeddingKind,
    pub snapshot: String,
}

/// A source file split into chunks, not yet written to the store
struct ChunkedDocument {
    document: SourceDocument,
    chunks: Vec<String>,
}

pub struct Ingestor<'a> {
    config: &'a Config,
    database: &'a Database,
    provider: &'a EmbeddingProvider,
    chunker: Chunker,
}

impl<'a> Ingestor<'a> {
    #[inline]
    pub fn new(
        config: &'a Config,
        database: &'a Database,
        provider: &'a EmbeddingProvider,
    ) -> Result<Self> {
        let chunker = Chunker::from_config(&config.chunking)?;

        Ok(Self {
            config,
            database,
            provider,
            chunker,
        })
    }

    /// Ingest every source file under `content_dir` and save a fresh snapshot
    #[inline]
    pub async fn run(&self, content_dir: &Path) -> Result<IngestReport> {
        let (report, _) = self.ingest(content_dir).await?;
        Ok(report)
    }

    /// Like [`Ingestor::run`], then publish the rebuilt index to `shared`
    #[inline]
    pub async fn run_into(&self, content_dir: &Path, shared: &SharedIndex) -> Result<IngestReport> {
        let (report, index) = self.ingest(content_dir).await?;
        shared.replace(index);
        Ok(report)
    }

    async fn ingest(&self, content_dir: &Path) -> Result<(IngestReport, VectorIndex)> {
        info!("Ingesting documents from {}", content_dir.display());
        let files = list_source_files(content_dir)?;

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(files.len() as u64).with_style(
                ProgressStyle::with_template("{spinner} [{pos}/{len}] Ingesting {msg}")
                    .expect("style template is valid"),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut chunked = Vec::with_capacity(files.len());
        for path in &files {
            bar.set_message(path.display().to_string());
            let document = read_source(path)?;
            let chunks = self.chunker.chunk(&document.text);
            chunked.push(ChunkedDocument { document, chunks });
            bar.inc(1);
        }
        bar.finish_and_clear();

        let texts: Vec<String> = chunked
            .iter()
            .flat_map(|entry| entry.chunks.iter().cloned())
            .collect();
        if texts.is_empty() {
            warn!("No chunks produced from {}", content_dir.display());
        }

        // A provider failure must leave the store untouched
        let corpus = self.provider.embed_corpus(&texts)?;

        let mut metadata = Vec::with_capacity(texts.len());
        for entry in &chunked {
            metadata.extend(self.store_document(entry).await?);
        }

        let embedding = corpus.profile.kind();
        let mut index = VectorIndex::new(self.config.embedding.dimension)
            .with_profile(corpus.profile);
        index.build(corpus.vectors, metadata)?;
        index.save(&self.config.index_dir(), self.config.snapshot_name())?;

        let report = IngestReport {
            documents: files.len(),
            chunks: texts.len(),
            embedding,
            snapshot: self.config.snapshot_name().to_string(),
        };
        self.write_manifest(&report)?;

        info!(
            "Ingested {} chunks from {} documents into snapshot '{}'",
            report.chunks, report.documents, report.snapshot
        );
        Ok((report, index))
    }

    async fn store_document(&self, entry: &ChunkedDocument) -> Result<Vec<ChunkMetadata>> {
        let document = &entry.document;
        let title = document.title().to_string();
        let stored = self
            .database
            .upsert_document(&document.source_path, Some(&title), &document.metadata)
            .await?;

        self.database.replace_chunks(stored.id, &entry.chunks).await?;
        debug!(
            "Stored {} chunks for {}",
            entry.chunks.len(),
            document.source_path
        );

        Ok((0..entry.chunks.len())
            .map(|position| ChunkMetadata {
                doc_id: stored.id,
                position: position as i64,
                source: document.source_path.clone(),
                title: Some(title.clone()),
            })
            .collect())
    }

    fn write_manifest(&self, report: &IngestReport) -> Result<()> {
        let path = self.config.manifest_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content =
            serde_json::to_string_pretty(report).context("Failed to serialize manifest")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;

        debug!("Wrote manifest to {}", path.display());
        Ok(())
    }
}
