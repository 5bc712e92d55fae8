use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::database::sqlite::models::{Chunk, Document, Metadata};
use crate::database::sqlite::queries::{ChunkQueries, DocumentQueries};
use crate::{Result, RetrievalError};


pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// Maps sqlx failures onto `StorageUnavailable` with a description of the failed step
pub(crate) trait StorageContext<T> {
    fn storage_context(self, message: &str) -> Result<T>;
}

impl<T> StorageContext<T> for std::result::Result<T, sqlx::Error> {
    #[inline]
    fn storage_context(self, message: &str) -> Result<T> {
        self.map_err(|e| RetrievalError::StorageUnavailable(format!("{}: {}", message, e)))
    }
}

/// Relational store of documents and their ordered chunks
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .storage_context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Open `file_name` inside `dir`, creating the directory first
    pub async fn initialize_in_dir(dir: &Path, file_name: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory: {}", dir.display()))?;

        Self::new(dir.join(file_name)).await
    }

    // Document operations
    pub async fn upsert_document(
        &self,
        source_path: &str,
        title: Option<&str>,
        metadata: &Metadata,
    ) -> Result<Document> {
        DocumentQueries::upsert(&self.pool, source_path, title, metadata).await
    }

    pub async fn get_document(&self, document_id: i64) -> Result<Option<Document>> {
        DocumentQueries::get_by_id(&self.pool, document_id).await
    }

    pub async fn get_document_by_source(&self, source_path: &str) -> Result<Option<Document>> {
        DocumentQueries::get_by_source_path(&self.pool, source_path).await
    }

    pub async fn list_documents(&self) -> Result<Vec<Document>> {
        DocumentQueries::list_all(&self.pool).await
    }

    pub async fn count_documents(&self) -> Result<i64> {
        DocumentQueries::count(&self.pool).await
    }

    // Chunk operations
    pub async fn replace_chunks(&self, document_id: i64, texts: &[String]) -> Result<usize> {
        ChunkQueries::replace_for_document(&self.pool, document_id, texts).await
    }

    pub async fn get_chunk_text(&self, document_id: i64, position: i64) -> Result<Option<String>> {
        ChunkQueries::get_text(&self.pool, document_id, position).await
    }

    pub async fn chunks_for_document(&self, document_id: i64) -> Result<Vec<Chunk>> {
        ChunkQueries::list_for_document(&self.pool, document_id).await
    }

    pub async fn count_chunks(&self) -> Result<i64> {
        ChunkQueries::count(&self.pool).await
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
