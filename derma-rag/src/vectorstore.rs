//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::{IndexEntry, SearchHit};

/// A storage backend for chunk embeddings with cosine-distance search.
///
/// Implementations manage named collections of [`IndexEntry`]s keyed by
/// chunk id. Upserting an existing id replaces it, so a collection never
/// holds two entries with the same id.
///
/// # Example
///
/// ```rust,ignore
/// use derma_rag::{VectorStore, InMemoryVectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("disease_knowledge", 384).await?;
/// store.upsert("disease_knowledge", &entries).await?;
/// let hits = store.search("disease_knowledge", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Backend name used in logs and error messages.
    fn backend(&self) -> &'static str;

    /// Create a named collection. No-op if it already exists.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Dimensions the collection was created with; `None` if it does not exist.
    async fn dimensions(&self, collection: &str) -> Result<Option<usize>>;

    /// Delete a named collection and all its entries. No-op if it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or replace entries in a collection.
    async fn upsert(&self, collection: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Number of entries in a collection; `0` if it does not exist.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Return the `top_k` entries nearest to `embedding`.
    ///
    /// Results are ordered by ascending cosine distance.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>>;
}

/// Cosine distance between two vectors, in `[0, 2]`.
///
/// Returns `1.0` (orthogonal) if either vector has zero magnitude or the
/// lengths differ.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 1.0;
    }
    (1.0 - dot / (norm_a * norm_b)).clamp(0.0, 2.0)
}

/// Sort hits by ascending distance and keep the first `top_k`.
pub(crate) fn nearest(mut hits: Vec<SearchHit>, top_k: usize) -> Vec<SearchHit> {
    hits.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(top_k);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_zero_distance() {
        assert!(cosine_distance(&[1.0, 2.0], &[2.0, 4.0]) < 1e-6);
    }

    #[test]
    fn opposite_vectors_have_distance_two() {
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn degenerate_vectors_are_orthogonal() {
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
    }
}
