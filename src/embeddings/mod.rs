// Embeddings module
// Chunking, the Ollama model client, and the TF-IDF fallback behind one provider

pub mod chunking;
pub mod ollama;
pub mod tfidf;


use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::{Result, RetrievalError};

pub use chunking::{Chunker, ChunkingConfig, chunk_text};
pub use ollama::OllamaEmbedder;
pub use tfidf::{TfIdfEmbedder, TfIdfVocabulary};

/// Which strategy produced a set of vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingKind {
    Model,
    TfIdf,
}

impl std::fmt::Display for EmbeddingKind {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            EmbeddingKind::Model => write!(f, "model"),
            EmbeddingKind::TfIdf => write!(f, "tfidf"),
        }
    }
}

/// Recorded on a built index so a loaded snapshot knows how its vectors were made
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum EmbeddingProfile {
    Model { model: String, dimension: usize },
    TfIdf(TfIdfVocabulary),
}

impl EmbeddingProfile {
    #[inline]
    pub fn kind(&self) -> EmbeddingKind {
        match *self {
            EmbeddingProfile::Model { .. } => EmbeddingKind::Model,
            EmbeddingProfile::TfIdf(_) => EmbeddingKind::TfIdf,
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        match *self {
            EmbeddingProfile::Model { dimension, .. } => dimension,
            EmbeddingProfile::TfIdf(ref vocabulary) => vocabulary.dimension(),
        }
    }
}

/// Turns a batch of texts into a `(texts.len(), dimension)` matrix
pub trait Embedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn dimension(&self) -> usize;

    fn kind(&self) -> EmbeddingKind;
}

/// Vectors for a whole ingestion batch plus the profile that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedCorpus {
    pub vectors: Vec<Vec<f32>>,
    pub profile: EmbeddingProfile,
}

/// The embedding strategy chosen once at construction
#[derive(Debug, Clone)]
pub enum EmbeddingProvider {
    Model(OllamaEmbedder),
    TfIdf(TfIdfEmbedder),
}

impl EmbeddingProvider {
    /// Pick the model when it is enabled and answers its health check, otherwise TF-IDF.
    #[inline]
    pub fn select(config: &Config) -> Self {
        let dimension = config.embedding.dimension;

        if !config.embedding.prefer_model {
            info!("Model embeddings disabled, using TF-IDF fallback");
            return Self::TfIdf(TfIdfEmbedder::new(dimension));
        }

        match Self::try_model(config) {
            Ok(embedder) => {
                info!("Using embedding model {}", embedder.model());
                Self::Model(embedder)
            }
            Err(e) => {
                warn!("Embedding model unavailable, falling back to TF-IDF: {}", e);
                Self::TfIdf(TfIdfEmbedder::new(dimension))
            }
        }
    }

    fn try_model(config: &Config) -> Result<OllamaEmbedder> {
        let embedder = OllamaEmbedder::new(&config.ollama, config.embedding.dimension)?;
        embedder.health_check()?;
        Ok(embedder)
    }

    /// Embed every chunk of an ingestion run in one call and describe the result
    #[inline]
    pub fn embed_corpus(&self, texts: &[String]) -> Result<EmbeddedCorpus> {
        match *self {
            EmbeddingProvider::Model(ref embedder) => {
                let vectors = embedder.embed(texts)?;
                Ok(EmbeddedCorpus {
                    vectors,
                    profile: EmbeddingProfile::Model {
                        model: embedder.model().to_string(),
                        dimension: embedder.dimension(),
                    },
                })
            }
            EmbeddingProvider::TfIdf(ref embedder) => {
                let vocabulary = embedder.fit(texts);
                let vectors = vocabulary.transform(texts);
                Ok(EmbeddedCorpus {
                    vectors,
                    profile: EmbeddingProfile::TfIdf(vocabulary),
                })
            }
        }
    }

    /// Embed a query as a single-item batch.
    ///
    /// When the index was built by TF-IDF its fitted vocabulary is reused so the query lands in
    /// the same feature space as the documents, whichever provider is active. An index built by
    /// a model can only be queried through that same model.
    #[inline]
    pub fn embed_query(&self, query: &str, profile: Option<&EmbeddingProfile>) -> Result<Vec<f32>> {
        match profile {
            Some(EmbeddingProfile::TfIdf(vocabulary)) => {
                debug!("Embedding query with the index's TF-IDF vocabulary");
                return single_row(vocabulary.transform(&[query.to_string()]));
            }
            Some(EmbeddingProfile::Model { model, .. }) => match *self {
                EmbeddingProvider::Model(ref embedder) if embedder.model() == model.as_str() => {}
                EmbeddingProvider::Model(ref embedder) => {
                    warn!(
                        "Index was built with model {} but the provider uses {}",
                        model,
                        embedder.model()
                    );
                    return Err(RetrievalError::EmbeddingProviderFailure(format!(
                        "index was built with model '{}' but the active model is '{}'",
                        model,
                        embedder.model()
                    )));
                }
                EmbeddingProvider::TfIdf(_) => {
                    warn!(
                        "Index was built with model {} but only TF-IDF is available",
                        model
                    );
                    return Err(RetrievalError::EmbeddingProviderFailure(format!(
                        "index was built with model '{}' which is unavailable, \
                         TF-IDF vectors cannot be compared against it",
                        model
                    )));
                }
            },
            None => {}
        }

        single_row(self.embed(&[query.to_string()])?)
    }
}

impl Embedder for EmbeddingProvider {
    #[inline]
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        match *self {
            EmbeddingProvider::Model(ref embedder) => embedder.embed(texts),
            EmbeddingProvider::TfIdf(ref embedder) => embedder.embed(texts),
        }
    }

    #[inline]
    fn dimension(&self) -> usize {
        match *self {
            EmbeddingProvider::Model(ref embedder) => embedder.dimension(),
            EmbeddingProvider::TfIdf(ref embedder) => embedder.dimension(),
        }
    }

    #[inline]
    fn kind(&self) -> EmbeddingKind {
        match *self {
            EmbeddingProvider::Model(_) => EmbeddingKind::Model,
            EmbeddingProvider::TfIdf(_) => EmbeddingKind::TfIdf,
        }
    }
}

fn single_row(mut rows: Vec<Vec<f32>>) -> Result<Vec<f32>> {
    match rows.len() {
        1 => Ok(rows.remove(0)),
        n => Err(RetrievalError::EmbeddingProviderFailure(format!(
            "expected 1 embedding for the query, got {}",
            n
        ))),
    }
}

/// Truncate or zero-pad trailing columns so every row is exactly `dimension` wide
#[inline]
pub fn normalize_dimension(rows: &mut [Vec<f32>], dimension: usize) {
    for row in rows.iter_mut() {
        row.resize(dimension, 0.0);
    }
}

/// Check a matrix against the configured dimension after normalization
#[inline]
pub fn ensure_dimension(rows: &[Vec<f32>], dimension: usize) -> Result<()> {
    match rows.iter().find(|row| row.len() != dimension) {
        Some(row) => Err(RetrievalError::DimensionMismatch {
            expected: dimension,
            actual: row.len(),
        }),
        None => Ok(()),
    }
}
