//! Semantic retrieval over the knowledge index.
//!
//! The retriever turns the nearest chunks for a query into a context block:
//! chunks at or beyond the distance cutoff are dropped, each entity
//! contributes its first qualifying chunk (plus any `main_info` chunk), and
//! supporting images are collected for every entity in discovery order.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::Result;
use crate::images::ImageResolver;
use crate::index::EmbeddingIndex;
use crate::record::{ChunkCategory, QueryRoute, RetrievalResult};

/// First line of every knowledge context block.
pub const CONTEXT_HEADER: &str = "Thông tin từ cơ sở dữ liệu bệnh:";

/// Builds knowledge context from index hits.
#[derive(Debug, Clone)]
pub struct SemanticRetriever {
    images: ImageResolver,
    distance_threshold: f32,
}

impl SemanticRetriever {
    /// Create a retriever keeping hits strictly closer than `distance_threshold`.
    pub fn new(images: ImageResolver, distance_threshold: f32) -> Self {
        Self { images, distance_threshold }
    }

    /// Retrieve context and images for `query` from the `top_k` nearest chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::RetrievalFailure`](crate::RagError::RetrievalFailure)
    /// if the index query fails. Image lookup failures are logged and only
    /// cost the images.
    pub async fn retrieve(
        &self,
        index: &EmbeddingIndex,
        query: &str,
        top_k: usize,
    ) -> Result<RetrievalResult> {
        let hits = index.query(query, top_k).await?;
        if hits.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        let mut context = format!("{CONTEXT_HEADER}\n");
        let mut seen: HashSet<String> = HashSet::new();
        let mut entities: Vec<String> = Vec::new();
        let mut images: Vec<PathBuf> = Vec::new();
        let mut kept = 0;

        for hit in &hits {
            if hit.distance >= self.distance_threshold {
                continue;
            }
            let chunk = &hit.chunk;
            let is_new = !seen.contains(&chunk.entity_name);
            if !is_new && chunk.category != ChunkCategory::MainInfo {
                continue;
            }

            context.push_str(&format!("\n{}\n", chunk.text));
            kept += 1;

            if is_new {
                seen.insert(chunk.entity_name.clone());
                entities.push(chunk.entity_name.clone());
                match self.images.resolve(&chunk.entity_name).await {
                    Ok(found) => images.extend(found),
                    Err(e) => {
                        warn!(entity = %chunk.entity_name, error = %e, "image lookup failed");
                    }
                }
            }
        }

        debug!(
            hits = hits.len(),
            kept,
            discarded = hits.len() - kept,
            entities = entities.len(),
            images = images.len(),
            "semantic retrieval"
        );

        if entities.is_empty() {
            return Ok(RetrievalResult::empty());
        }
        Ok(RetrievalResult {
            route: Some(QueryRoute::Knowledge),
            context: Some(context.trim_end().to_string()),
            images: (!images.is_empty()).then_some(images),
        })
    }
}
