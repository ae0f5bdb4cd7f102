//! In-memory vector store using cosine distance.
//!
//! This module provides [`InMemoryVectorStore`], a vector store backed by a
//! `HashMap` protected by a `tokio::sync::RwLock`. The index falls back to it
//! for the lifetime of the process when the durable store cannot be opened.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{RagError, Result};
use crate::record::{IndexEntry, SearchHit};
use crate::vectorstore::{VectorStore, cosine_distance, nearest};

#[derive(Debug)]
struct Collection {
    dimensions: usize,
    entries: HashMap<String, IndexEntry>,
}

/// An in-memory vector store.
///
/// Collections are keyed by name; each maps chunk ID → entry.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing(collection: &str) -> RagError {
    RagError::vector_store("InMemory", format!("collection '{collection}' does not exist"))
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn backend(&self) -> &'static str {
        "InMemory"
    }

    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Collection { dimensions, entries: HashMap::new() });
        Ok(())
    }

    async fn dimensions(&self, collection: &str) -> Result<Option<usize>> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map(|c| c.dimensions))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
        for entry in entries {
            store.entries.insert(entry.chunk.id.clone(), entry.clone());
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).map_or(0, |c| c.entries.len()))
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;

        let hits: Vec<SearchHit> = store
            .entries
            .values()
            .map(|entry| SearchHit {
                chunk: entry.chunk.clone(),
                distance: cosine_distance(&entry.embedding, embedding),
            })
            .collect();

        Ok(nearest(hits, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dimensions_are_recorded_at_creation() {
        let store = InMemoryVectorStore::new();
        assert_eq!(store.dimensions("c").await.unwrap(), None);

        store.create_collection("c", 384).await.unwrap();
        store.create_collection("c", 16).await.unwrap();
        assert_eq!(store.dimensions("c").await.unwrap(), Some(384));

        store.delete_collection("c").await.unwrap();
        assert_eq!(store.dimensions("c").await.unwrap(), None);
    }
}
