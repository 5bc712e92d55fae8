
use bincode::config::standard as bincode_config;
use bincode::{Decode, Encode, decode_from_slice, encode_to_vec};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{ChunkMetadata, VectorIndex};
use crate::embeddings::EmbeddingProfile;
use crate::{Result, RetrievalError};

/// Bumped whenever either blob layout changes
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Encode, Decode)]
struct VectorsBlob {
    version: u32,
    dimension: usize,
    rows: usize,
    /// Row-major `rows x dimension` matrix
    values: Vec<f32>,
}

#[derive(Debug, Encode, Decode)]
struct MetadataBlob {
    version: u32,
    profile: Option<EmbeddingProfile>,
    records: Vec<ChunkMetadata>,
}

/// Decoded snapshot, ready to be rebuilt into a [`VectorIndex`]
#[derive(Debug)]
pub struct SnapshotContents {
    pub dimension: usize,
    pub vectors: Vec<Vec<f32>>,
    pub metadata: Vec<ChunkMetadata>,
    pub profile: Option<EmbeddingProfile>,
}

#[inline]
pub fn vectors_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}_vectors.bin", name))
}

#[inline]
pub fn metadata_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}_meta.bin", name))
}

/// True when both blobs of the snapshot are present
#[inline]
pub fn exists(dir: &Path, name: &str) -> bool {
    vectors_path(dir, name).is_file() && metadata_path(dir, name).is_file()
}

fn staged_path(target: &Path) -> PathBuf {
    let mut staged = target.as_os_str().to_owned();
    staged.push(".tmp");
    PathBuf::from(staged)
}

pub(super) fn write(index: &VectorIndex, dir: &Path, name: &str) -> Result<()> {
    fs::create_dir_all(dir)?;

    let vectors = VectorsBlob {
        version: FORMAT_VERSION,
        dimension: index.dimension(),
        rows: index.len(),
        values: index.vectors().iter().flatten().copied().collect(),
    };
    let metadata = MetadataBlob {
        version: FORMAT_VERSION,
        profile: index.profile().cloned(),
        records: index.metadata().to_vec(),
    };

    let vector_bytes = encode_to_vec(&vectors, bincode_config())
        .map_err(|e| anyhow::anyhow!("Failed to encode index vectors: {}", e))?;
    let metadata_bytes = encode_to_vec(&metadata, bincode_config())
        .map_err(|e| anyhow::anyhow!("Failed to encode index metadata: {}", e))?;

    // Stage both blobs before renaming either one into place
    let vectors_target = vectors_path(dir, name);
    let metadata_target = metadata_path(dir, name);
    let vectors_staged = staged_path(&vectors_target);
    let metadata_staged = staged_path(&metadata_target);

    fs::write(&vectors_staged, vector_bytes)?;
    if let Err(e) = fs::write(&metadata_staged, metadata_bytes) {
        let _ = fs::remove_file(&vectors_staged);
        return Err(e.into());
    }
    fs::rename(&vectors_staged, &vectors_target)?;
    fs::rename(&metadata_staged, &metadata_target)?;

    debug!(
        "Saved index snapshot '{}' to {} ({} vectors)",
        name,
        dir.display(),
        index.len()
    );
    Ok(())
}

pub(super) fn read(dir: &Path, name: &str) -> Result<SnapshotContents> {
    if !exists(dir, name) {
        return Err(RetrievalError::IndexNotFound {
            name: name.to_string(),
            dir: dir.display().to_string(),
        });
    }

    let corrupt = |reason: String| {
        warn!("Index snapshot '{}' is unreadable: {}", name, reason);
        RetrievalError::IndexCorrupt {
            name: name.to_string(),
            reason,
        }
    };

    let vector_bytes = fs::read(vectors_path(dir, name))?;
    let metadata_bytes = fs::read(metadata_path(dir, name))?;

    let (vectors, _): (VectorsBlob, usize) = decode_from_slice(&vector_bytes, bincode_config())
        .map_err(|e| corrupt(format!("vectors blob: {}", e)))?;
    let (metadata, _): (MetadataBlob, usize) =
        decode_from_slice(&metadata_bytes, bincode_config())
            .map_err(|e| corrupt(format!("metadata blob: {}", e)))?;

    if vectors.version != FORMAT_VERSION || metadata.version != FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {}/{}",
            vectors.version, metadata.version
        )));
    }

    let expected_values = vectors.rows.checked_mul(vectors.dimension);
    if expected_values != Some(vectors.values.len()) {
        return Err(corrupt(format!(
            "{} values cannot form {} rows of dimension {}",
            vectors.values.len(),
            vectors.rows,
            vectors.dimension
        )));
    }

    if vectors.rows != metadata.records.len() {
        return Err(corrupt(format!(
            "{} vectors but {} metadata records",
            vectors.rows,
            metadata.records.len()
        )));
    }

    let rows = if vectors.dimension == 0 {
        vec![Vec::new(); vectors.rows]
    } else {
        vectors
            .values
            .chunks_exact(vectors.dimension)
            .map(<[f32]>::to_vec)
            .collect()
    };

    Ok(SnapshotContents {
        dimension: vectors.dimension,
        vectors: rows,
        metadata: metadata.records,
        profile: metadata.profile,
    })
}
