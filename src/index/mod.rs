// Vector index module
// Exact cosine k-NN over parallel vector/metadata arrays, persisted as named snapshots

pub mod snapshot;

#[cfg(test)]
mod tests;

use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

use crate::embeddings::EmbeddingProfile;
use crate::{Result, RetrievalError};

/// Where a vector came from: the chunk at `position` of document `doc_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct ChunkMetadata {
    pub doc_id: i64,
    pub position: i64,
    pub source: String,
    pub title: Option<String>,
}

/// In-memory nearest-neighbor index.
///
/// `vectors[i]` and `metadata[i]` always describe the same chunk. Every vector is exactly
/// `dimension` wide. The index is never mutated by queries.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    metadata: Vec<ChunkMetadata>,
    norms: Vec<f32>,
    profile: Option<EmbeddingProfile>,
}

impl VectorIndex {
    /// Create an empty index for vectors of `dimension` columns
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            metadata: Vec::new(),
            norms: Vec::new(),
            profile: None,
        }
    }

    /// Record which embedding strategy produced the vectors
    #[inline]
    #[must_use]
    pub fn with_profile(mut self, profile: EmbeddingProfile) -> Self {
        self.profile = Some(profile);
        self
    }

    #[inline]
    pub fn set_profile(&mut self, profile: Option<EmbeddingProfile>) {
        self.profile = profile;
    }

    #[inline]
    pub fn profile(&self) -> Option<&EmbeddingProfile> {
        self.profile.as_ref()
    }

    /// Replace the contents of the index with `vectors` and their parallel `metadata`.
    ///
    /// An empty build is legal and answers every query with no results. On error the index is
    /// left unchanged.
    #[inline]
    pub fn build(&mut self, vectors: Vec<Vec<f32>>, metadata: Vec<ChunkMetadata>) -> Result<()> {
        if vectors.len() != metadata.len() {
            return Err(RetrievalError::Other(anyhow::anyhow!(
                "Cannot build index from {} vectors and {} metadata records",
                vectors.len(),
                metadata.len()
            )));
        }

        if let Some(row) = vectors.iter().find(|row| row.len() != self.dimension) {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: row.len(),
            });
        }

        self.norms = vectors.iter().map(|row| l2_norm(row)).collect();
        self.vectors = vectors;
        self.metadata = metadata;

        info!(
            "Built vector index with {} vectors of dimension {}",
            self.vectors.len(),
            self.dimension
        );
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    #[inline]
    pub fn metadata(&self) -> &[ChunkMetadata] {
        &self.metadata
    }

    /// The `top_k` nearest records by cosine distance, nearest first.
    ///
    /// Equal distances keep insertion order. Zero vectors sit at distance 1.0 from everything.
    #[inline]
    pub fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<(ChunkMetadata, f32)>> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        if vector.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let query_norm = l2_norm(vector);
        let mut scored = self
            .vectors
            .iter()
            .zip(&self.norms)
            .map(|(row, &norm)| cosine_distance(row, norm, vector, query_norm))
            .enumerate()
            .collect::<Vec<_>>();

        // Stable sort keeps ascending insertion index among equal distances
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        debug!(
            "Index query returned {} of {} records",
            scored.len(),
            self.len()
        );

        Ok(scored
            .into_iter()
            .filter_map(|(i, distance)| self.metadata.get(i).map(|m| (m.clone(), distance)))
            .collect())
    }

    /// Persist under `{dir}/{name}_vectors.bin` and `{dir}/{name}_meta.bin`
    #[inline]
    pub fn save(&self, dir: &Path, name: &str) -> Result<()> {
        snapshot::write(self, dir, name)
    }

    /// Load a snapshot written by [`VectorIndex::save`]
    #[inline]
    pub fn load(dir: &Path, name: &str) -> Result<Self> {
        let contents = snapshot::read(dir, name)?;

        let mut index = Self::new(contents.dimension);
        index.build(contents.vectors, contents.metadata)?;
        index.set_profile(contents.profile);

        info!("Loaded index snapshot '{}' ({} vectors)", name, index.len());
        Ok(index)
    }
}

/// Handle shared between readers and the ingestion run that rebuilds the index.
///
/// Readers clone out an `Arc` and query it without holding the lock. A rebuilt index is
/// swapped in whole.
#[derive(Debug, Clone)]
pub struct SharedIndex {
    inner: Arc<RwLock<Arc<VectorIndex>>>,
}

impl SharedIndex {
    #[inline]
    pub fn new(index: VectorIndex) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// The index as of this call
    #[inline]
    pub fn current(&self) -> Arc<VectorIndex> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Atomically publish a new index to subsequent readers
    #[inline]
    pub fn replace(&self, index: VectorIndex) {
        let next = Arc::new(index);
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
        debug!("Published rebuilt vector index");
    }
}

fn l2_norm(vector: &[f32]) -> f32 {
    vector.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_distance(row: &[f32], row_norm: f32, query: &[f32], query_norm: f32) -> f32 {
    if row_norm == 0.0 || query_norm == 0.0 {
        return 1.0;
    }

    let dot = row.iter().zip(query).map(|(a, b)| a * b).sum::<f32>();
    1.0 - dot / (row_norm * query_norm)
}
