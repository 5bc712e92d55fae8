
use super::StorageContext;
use super::models::{Chunk, Document, Metadata};
use crate::Result;
use anyhow::Context;
use sqlx::SqlitePool;
use tracing::debug;

pub struct DocumentQueries;

impl DocumentQueries {
    /// Insert a document, or update it in place when `source_path` already exists.
    ///
    /// Metadata is always overwritten. The title is only overwritten by a non-empty title.
    #[inline]
    pub async fn upsert(
        pool: &SqlitePool,
        source_path: &str,
        title: Option<&str>,
        metadata: &Metadata,
    ) -> Result<Document> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        let metadata_json =
            serde_json::to_string(metadata).context("Failed to serialize document metadata")?;

        sqlx::query(
            r#"
            INSERT INTO documents (source_path, title, metadata)
            VALUES (?, ?, ?)
            ON CONFLICT(source_path) DO UPDATE SET
                metadata = excluded.metadata,
                title = COALESCE(excluded.title, documents.title)
            "#,
        )
        .bind(source_path)
        .bind(title)
        .bind(&metadata_json)
        .execute(pool)
        .await
        .storage_context("Failed to upsert document")?;

        let document = Self::get_by_source_path(pool, source_path)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Upserted document {} vanished", source_path))?;

        debug!("Upserted document {} ({})", document.id, source_path);
        Ok(document)
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(
            r#"
            SELECT id, source_path, title, metadata, created_at
            FROM documents WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .storage_context("Failed to get document by id")
    }

    #[inline]
    pub async fn get_by_source_path(
        pool: &SqlitePool,
        source_path: &str,
    ) -> Result<Option<Document>> {
        sqlx::query_as::<_, Document>(
            r#"
            SELECT id, source_path, title, metadata, created_at
            FROM documents WHERE source_path = ?
            "#,
        )
        .bind(source_path)
        .fetch_optional(pool)
        .await
        .storage_context("Failed to get document by source path")
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Document>> {
        sqlx::query_as::<_, Document>(
            r#"
            SELECT id, source_path, title, metadata, created_at
            FROM documents ORDER BY source_path
            "#,
        )
        .fetch_all(pool)
        .await
        .storage_context("Failed to list documents")
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM documents")
            .fetch_one(pool)
            .await
            .storage_context("Failed to count documents")
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    /// Replace every chunk of a document with `texts`, numbered from 0, in one transaction
    #[inline]
    pub async fn replace_for_document(
        pool: &SqlitePool,
        document_id: i64,
        texts: &[String],
    ) -> Result<usize> {
        let mut transaction = pool
            .begin()
            .await
            .storage_context("Failed to begin transaction for chunk replacement")?;

        let removed = sqlx::query("DELETE FROM chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *transaction)
            .await
            .storage_context("Failed to delete existing chunks")?
            .rows_affected();

        for (position, text) in texts.iter().enumerate() {
            sqlx::query("INSERT INTO chunks (document_id, text, position) VALUES (?, ?, ?)")
                .bind(document_id)
                .bind(text)
                .bind(position as i64)
                .execute(&mut *transaction)
                .await
                .storage_context("Failed to insert chunk")?;
        }

        transaction
            .commit()
            .await
            .storage_context("Failed to commit chunk replacement")?;

        debug!(
            "Replaced {} chunks with {} for document {}",
            removed,
            texts.len(),
            document_id
        );
        Ok(texts.len())
    }

    #[inline]
    pub async fn get_text(
        pool: &SqlitePool,
        document_id: i64,
        position: i64,
    ) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT text FROM chunks WHERE document_id = ? AND position = ?",
        )
        .bind(document_id)
        .bind(position)
        .fetch_optional(pool)
        .await
        .storage_context("Failed to get chunk text")
    }

    #[inline]
    pub async fn list_for_document(pool: &SqlitePool, document_id: i64) -> Result<Vec<Chunk>> {
        sqlx::query_as::<_, Chunk>(
            r#"
            SELECT id, document_id, text, position
            FROM chunks WHERE document_id = ? ORDER BY position
            "#,
        )
        .bind(document_id)
        .fetch_all(pool)
        .await
        .storage_context("Failed to list chunks for document")
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chunks")
            .fetch_one(pool)
            .await
            .storage_context("Failed to count chunks")
    }
}
