// Retriever module
// Query embedding, index lookup, and hydration from the document store


use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::Result;
use crate::database::Database;
use crate::embeddings::EmbeddingProvider;
use crate::index::SharedIndex;

/// One ranked hit. `score` is the cosine distance reported by the index, lower is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub score: f32,
    pub doc_id: i64,
    pub position: i64,
    pub chunk: Option<String>,
    pub title: Option<String>,
    pub source: String,
}

impl RetrievalResult {
    /// `1 - score`, in `[0, 1]` for non-negative embeddings
    #[inline]
    pub fn similarity(&self) -> f32 {
        1.0 - self.score
    }
}

pub struct Retriever {
    index: SharedIndex,
    database: Database,
    provider: EmbeddingProvider,
}

impl Retriever {
    #[inline]
    pub fn new(index: SharedIndex, database: Database, provider: EmbeddingProvider) -> Self {
        Self {
            index,
            database,
            provider,
        }
    }

    #[inline]
    pub fn index(&self) -> &SharedIndex {
        &self.index
    }

    #[inline]
    pub fn provider(&self) -> &EmbeddingProvider {
        &self.provider
    }

    /// Rank the `top_k` chunks nearest to `query`.
    ///
    /// Records whose chunk or document row has disappeared from the store come back with
    /// `chunk`/`title` set to `None`. Store failures are still errors.
    #[inline]
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<RetrievalResult>> {
        let index = self.index.current();
        if index.is_empty() || top_k == 0 {
            debug!("Nothing to retrieve for query (index size {})", index.len());
            return Ok(Vec::new());
        }

        let vector = self.provider.embed_query(query, index.profile())?;
        let hits = index.query(&vector, top_k)?;

        let mut results = Vec::with_capacity(hits.len());
        for (metadata, distance) in hits {
            let chunk = self
                .database
                .get_chunk_text(metadata.doc_id, metadata.position)
                .await?;
            let title = self
                .database
                .get_document(metadata.doc_id)
                .await?
                .and_then(|document| document.title);

            if chunk.is_none() {
                warn!(
                    "Chunk {} of document {} is missing from the store",
                    metadata.position, metadata.doc_id
                );
            }

            results.push(RetrievalResult {
                score: distance,
                doc_id: metadata.doc_id,
                position: metadata.position,
                chunk,
                title,
                source: metadata.source,
            });
        }

        debug!("Retrieved {} results for query", results.len());
        Ok(results)
    }
}
