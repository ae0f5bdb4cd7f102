//! SQLite-backed durable vector store.
//!
//! Chunks live in a single SQLite file under the configured index directory.
//! Search is brute-force cosine distance over the collection's rows, which is
//! plenty for a corpus of a few hundred records.
//!
//! This module is only available when the `sqlite` feature is enabled.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::{RagError, Result};
use crate::record::{Chunk, ChunkCategory, IndexEntry, SearchHit};
use crate::vectorstore::{VectorStore, cosine_distance, nearest};

const BACKEND: &str = "SQLite";

/// File name of the database inside the index directory.
pub const DATABASE_FILE: &str = "index.sqlite3";

/// A [`VectorStore`] persisted to a SQLite database file.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteVectorStore {
    /// Open (creating if needed) the store under `index_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexUnavailable`] if the directory cannot be
    /// created or the database cannot be opened.
    pub async fn open(index_dir: impl AsRef<Path>) -> Result<Self> {
        let index_dir = index_dir.as_ref();
        tokio::fs::create_dir_all(index_dir).await.map_err(unavailable)?;

        let db_path = index_dir.join(DATABASE_FILE);
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        let store = Self { pool, db_path };
        store.init_schema().await.map_err(unavailable)?;
        debug!(path = %store.db_path.display(), "opened sqlite vector store");
        Ok(store)
    }

    /// Path of the underlying database file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY,
                dimensions INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                collection TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                document TEXT NOT NULL,
                category TEXT NOT NULL,
                entity_name TEXT NOT NULL,
                danger_level TEXT NOT NULL,
                record_index INTEGER NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, chunk_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(())
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections WHERE name = ?1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(count > 0)
    }

    async fn require_collection(&self, name: &str) -> Result<()> {
        if self.collection_exists(name).await? {
            Ok(())
        } else {
            Err(RagError::vector_store(BACKEND, format!("collection '{name}' does not exist")))
        }
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> Result<Chunk> {
        let category: String = row.get("category");
        let record_index: i64 = row.get("record_index");
        Ok(Chunk {
            id: row.get("chunk_id"),
            text: row.get("document"),
            category: category.parse::<ChunkCategory>()?,
            entity_name: row.get("entity_name"),
            danger_level: row.get("danger_level"),
            record_index: usize::try_from(record_index).unwrap_or_default(),
        })
    }
}

fn unavailable<E: std::fmt::Display>(e: E) -> RagError {
    RagError::IndexUnavailable { backend: BACKEND.to_string(), message: e.to_string() }
}

fn store_error<E: std::fmt::Display>(e: E) -> RagError {
    RagError::vector_store(BACKEND, e)
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    fn backend(&self) -> &'static str {
        BACKEND
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO collections (name, dimensions) VALUES (?1, ?2)")
            .bind(name)
            .bind(dimensions as i64)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(())
    }

    async fn dimensions(&self, collection: &str) -> Result<Option<usize>> {
        let dimensions: Option<i64> =
            sqlx::query_scalar("SELECT dimensions FROM collections WHERE name = ?1")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(dimensions.and_then(|d| usize::try_from(d).ok()))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        sqlx::query("DELETE FROM chunks WHERE collection = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        sqlx::query("DELETE FROM collections WHERE name = ?1")
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        tx.commit().await.map_err(store_error)?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.require_collection(collection).await?;

        let mut tx = self.pool.begin().await.map_err(store_error)?;
        for entry in entries {
            let chunk = &entry.chunk;
            sqlx::query(
                "INSERT OR REPLACE INTO chunks
                 (collection, chunk_id, document, category, entity_name, danger_level, record_index, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(collection)
            .bind(&chunk.id)
            .bind(&chunk.text)
            .bind(chunk.category.as_str())
            .bind(&chunk.entity_name)
            .bind(&chunk.danger_level)
            .bind(chunk.record_index as i64)
            .bind(Self::serialize_embedding(&entry.embedding))
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }
        tx.commit().await.map_err(store_error)?;
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE collection = ?1")
            .bind(collection)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.require_collection(collection).await?;

        let rows = sqlx::query(
            "SELECT chunk_id, document, category, entity_name, danger_level, record_index, embedding
             FROM chunks
             WHERE collection = ?1",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let bytes: Vec<u8> = row.get("embedding");
            let stored = Self::deserialize_embedding(&bytes);
            hits.push(SearchHit {
                chunk: Self::row_to_chunk(row)?,
                distance: cosine_distance(&stored, embedding),
            });
        }

        Ok(nearest(hits, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, category: ChunkCategory, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry {
            chunk: Chunk {
                id: id.to_string(),
                text: format!("text of {id}"),
                category,
                entity_name: "Melanoma".to_string(),
                danger_level: "Cao".to_string(),
                record_index: 2,
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn entries_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = SqliteVectorStore::open(dir.path()).await.unwrap();
            store.create_collection("c", 2).await.unwrap();
            store
                .upsert("c", &[entry("2_0", ChunkCategory::MainInfo, vec![1.0, 0.0])])
                .await
                .unwrap();
        }

        let reopened = SqliteVectorStore::open(dir.path()).await.unwrap();
        assert_eq!(reopened.count("c").await.unwrap(), 1);
        assert_eq!(reopened.dimensions("c").await.unwrap(), Some(2));
        assert_eq!(reopened.dimensions("missing").await.unwrap(), None);

        let hits = reopened.search("c", &[1.0, 0.0], 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk, entry("2_0", ChunkCategory::MainInfo, vec![]).chunk);
        assert!(hits[0].distance < 1e-6);
    }

    #[tokio::test]
    async fn search_orders_by_ascending_distance() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("c", 2).await.unwrap();
        store
            .upsert(
                "c",
                &[
                    entry("0_0", ChunkCategory::MainInfo, vec![0.0, 1.0]),
                    entry("0_1", ChunkCategory::Symptoms, vec![1.0, 0.1]),
                    entry("0_2", ChunkCategory::Treatment, vec![-1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = store.search("c", &[1.0, 0.0], 2).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["0_1", "0_0"]);
    }

    #[tokio::test]
    async fn upsert_replaces_same_id_and_delete_clears() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path()).await.unwrap();
        store.create_collection("c", 2).await.unwrap();
        store.upsert("c", &[entry("0_0", ChunkCategory::MainInfo, vec![1.0, 0.0])]).await.unwrap();
        store.upsert("c", &[entry("0_0", ChunkCategory::MainInfo, vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);

        store.delete_collection("c").await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 0);
        assert!(store.search("c", &[1.0, 0.0], 1).await.is_err());
    }

    #[tokio::test]
    async fn unwritable_location_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "file").unwrap();

        let result = SqliteVectorStore::open(blocker.join("index")).await;
        assert!(matches!(result, Err(RagError::IndexUnavailable { .. })));
    }
}
