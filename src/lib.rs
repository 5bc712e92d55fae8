use thiserror::Error;

pub type Result<T> = std::result::Result<T, RetrievalError>;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index snapshot '{name}' not found in {dir}")]
    IndexNotFound { name: String, dir: String },

    #[error("Index snapshot '{name}' is corrupt: {reason}")]
    IndexCorrupt { name: String, reason: String },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Embedding provider failure: {0}")]
    EmbeddingProviderFailure(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RetrievalError {
    #[inline]
    fn from(error: sqlx::Error) -> Self {
        Self::StorageUnavailable(error.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for RetrievalError {
    #[inline]
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        Self::StorageUnavailable(format!("migration failed: {}", error))
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod index;
pub mod ingest;
pub mod retriever;
