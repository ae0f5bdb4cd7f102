//! Embedding index over the knowledge corpus.
//!
//! The [`EmbeddingIndex`] composes an [`EmbeddingProvider`], a [`VectorStore`]
//! and a [`RecordChunker`]. Building chunks every record, embeds the chunks in
//! batches and writes them under the configured collection; querying embeds
//! the query text and returns the nearest chunks.
//!
//! # Example
//!
//! ```rust,ignore
//! use derma_rag::{EmbeddingIndex, HashingEmbeddingProvider, RagConfig};
//!
//! let config = RagConfig::rooted_at("database");
//! let index = EmbeddingIndex::open(&config, Arc::new(HashingEmbeddingProvider::default())).await;
//! index.build(&records).await?;
//! let hits = index.query("ngứa và bong vảy", 5).await?;
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::chunking::RecordChunker;
use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorStore;
use crate::record::{Chunk, IndexEntry, KnowledgeRecord, SearchHit};
use crate::vectorstore::VectorStore;

/// Persistent (or in-memory fallback) embedding index of knowledge chunks.
pub struct EmbeddingIndex {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    chunker: RecordChunker,
    collection: String,
    batch_size: usize,
}

impl EmbeddingIndex {
    /// Open the durable store at `config.index_path`.
    ///
    /// If it cannot be opened the index falls back to an
    /// [`InMemoryVectorStore`] for the rest of the process, with a warning.
    /// Opening therefore never fails.
    pub async fn open(config: &RagConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let store = Self::open_store(config).await;
        Self::new(store, provider, config)
    }

    #[cfg(feature = "sqlite")]
    async fn open_store(config: &RagConfig) -> Arc<dyn VectorStore> {
        match crate::sqlite::SqliteVectorStore::open(&config.index_path).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(
                    path = %config.index_path.display(),
                    error = %e,
                    "durable index unavailable, using in-memory index"
                );
                Arc::new(InMemoryVectorStore::new())
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    async fn open_store(_config: &RagConfig) -> Arc<dyn VectorStore> {
        Arc::new(InMemoryVectorStore::new())
    }

    /// Create an index over an explicit store.
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        config: &RagConfig,
    ) -> Self {
        Self {
            store,
            provider,
            chunker: RecordChunker::new(config.max_chunk_tokens),
            collection: config.collection.clone(),
            batch_size: config.batch_size.max(1),
        }
    }

    /// Name of the backend actually in use.
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Name of the collection chunks are written to.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Number of stored chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::VectorStoreError`] if the store cannot be read.
    pub async fn count(&self) -> Result<usize> {
        self.store.count(&self.collection).await
    }

    /// Whether the index holds no chunks. A store that cannot be read counts
    /// as empty.
    pub async fn is_empty(&self) -> bool {
        match self.count().await {
            Ok(count) => count == 0,
            Err(e) => {
                warn!(error = %e, "could not count index entries");
                true
            }
        }
    }

    /// Whether the index must be rebuilt before it can answer queries.
    ///
    /// True when it is empty, or when its vectors were built by an embedder
    /// of a different dimensionality than the current provider.
    pub async fn needs_rebuild(&self) -> bool {
        if self.is_empty().await {
            return true;
        }
        let expected = self.provider.dimensions();
        match self.store.dimensions(&self.collection).await {
            Ok(Some(stored)) if stored == expected => false,
            Ok(stored) => {
                warn!(
                    collection = %self.collection,
                    stored = ?stored,
                    expected,
                    provider = self.provider.name(),
                    "index dimensions do not match the embedder"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "could not read index dimensions");
                true
            }
        }
    }

    /// Replace the collection's contents with the chunks of `records`.
    ///
    /// The record's position in `records` is its record index. Malformed
    /// records are logged and skipped. Returns the number of chunks stored.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ReindexFailure`] if the collection cannot be reset,
    /// or if embedding or storing a batch fails.
    pub async fn build(&self, records: &[KnowledgeRecord]) -> Result<usize> {
        let collection = self.collection.as_str();
        self.store.delete_collection(collection).await.map_err(|e| {
            error!(collection, error = %e, "failed to clear collection");
            RagError::ReindexFailure(format!("failed to clear collection '{collection}': {e}"))
        })?;
        self.store.create_collection(collection, self.provider.dimensions()).await.map_err(
            |e| {
                error!(collection, error = %e, "failed to create collection");
                RagError::ReindexFailure(format!(
                    "failed to create collection '{collection}': {e}"
                ))
            },
        )?;

        let mut batch: Vec<Chunk> = Vec::with_capacity(self.batch_size);
        let mut stored = 0;
        let mut skipped = 0;

        for (record_index, record) in records.iter().enumerate() {
            let chunks = match self.chunker.chunks(record_index, record) {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(record_index, error = %e, "skipping malformed record");
                    skipped += 1;
                    continue;
                }
            };
            for chunk in chunks {
                batch.push(chunk);
                if batch.len() == self.batch_size {
                    stored += self.flush(&mut batch).await?;
                }
            }
        }
        stored += self.flush(&mut batch).await?;

        info!(
            collection,
            backend = self.store.backend(),
            records = records.len(),
            skipped,
            chunks = stored,
            "built knowledge index"
        );
        Ok(stored)
    }

    async fn flush(&self, batch: &mut Vec<Chunk>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let chunks = std::mem::take(batch);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();

        let embeddings = self.provider.embed_batch(&texts).await.map_err(|e| {
            error!(provider = self.provider.name(), error = %e, "embedding failed during indexing");
            RagError::ReindexFailure(format!("embedding failed: {e}"))
        })?;
        if embeddings.len() != chunks.len() {
            return Err(RagError::ReindexFailure(format!(
                "provider returned {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();
        self.store.upsert(&self.collection, &entries).await.map_err(|e| {
            error!(collection = %self.collection, error = %e, "upsert failed during indexing");
            RagError::ReindexFailure(format!("upsert failed: {e}"))
        })?;
        debug!(collection = %self.collection, batch_size = entries.len(), "stored batch");
        Ok(entries.len())
    }

    /// Return up to `top_k` chunks nearest to `text`, in ascending distance.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalFailure`] if embedding or search fails.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let embedding = self.provider.embed(text).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            RagError::RetrievalFailure(format!("query embedding failed: {e}"))
        })?;

        self.store.search(&self.collection, &embedding, top_k).await.map_err(|e| {
            error!(collection = %self.collection, error = %e, "vector store search failed");
            RagError::RetrievalFailure(format!(
                "search failed in collection '{}': {e}",
                self.collection
            ))
        })
    }
}
