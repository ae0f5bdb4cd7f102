//! Property tests for vector store search ordering.

use std::collections::HashMap;

use derma_rag::inmemory::InMemoryVectorStore;
use derma_rag::record::{Chunk, ChunkCategory, IndexEntry};
use derma_rag::vectorstore::VectorStore;
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

fn arb_category() -> impl Strategy<Value = ChunkCategory> {
    prop::sample::select(ChunkCategory::ALL.to_vec())
}

/// Generate an index entry with a normalized embedding.
fn arb_entry(dim: usize) -> impl Strategy<Value = IndexEntry> {
    (0usize..6, 0usize..6, "[a-z ]{5,30}", arb_category(), arb_normalized_embedding(dim)).prop_map(
        |(record_index, chunk_index, text, category, embedding)| IndexEntry {
            chunk: Chunk {
                id: format!("{record_index}_{chunk_index}"),
                text,
                category,
                entity_name: format!("Entity {record_index}"),
                danger_level: "Thấp".to_string(),
                record_index,
            },
            embedding,
        },
    )
}

fn dedupe(entries: &[IndexEntry]) -> Vec<IndexEntry> {
    let mut by_id: HashMap<String, IndexEntry> = HashMap::new();
    for entry in entries {
        by_id.entry(entry.chunk.id.clone()).or_insert_with(|| entry.clone());
    }
    by_id.into_values().collect()
}

async fn search_and_count<S: VectorStore>(
    store: &S,
    entries: &[IndexEntry],
    query: &[f32],
    top_k: usize,
) -> (Vec<derma_rag::record::SearchHit>, usize) {
    store.create_collection("test", query.len()).await.unwrap();
    store.upsert("test", entries).await.unwrap();
    let count = store.count("test").await.unwrap();
    (store.search("test", query, top_k).await.unwrap(), count)
}

/// For any set of stored entries, search returns at most `top_k` hits in
/// ascending cosine distance, each distance within `[0, 2]`, and the stored
/// count equals the number of distinct chunk ids.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_ascending_and_bounded_by_top_k(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..25,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (results, count) = rt.block_on(async {
                let store = InMemoryVectorStore::new();
                search_and_count(&store, &entries, &query, top_k).await
            });

            prop_assert_eq!(count, dedupe(&entries).len());
            prop_assert!(results.len() <= top_k);
            prop_assert!(results.len() <= count);
            prop_assert_eq!(results.len(), top_k.min(count));

            for hit in &results {
                prop_assert!((0.0..=2.0).contains(&hit.distance));
            }
            for window in results.windows(2) {
                prop_assert!(
                    window[0].distance <= window[1].distance,
                    "results not in ascending order: {} > {}",
                    window[0].distance,
                    window[1].distance,
                );
            }
        }
    }
}

#[cfg(feature = "sqlite")]
mod prop_sqlite_search_ordering {
    use derma_rag::sqlite::SqliteVectorStore;

    use super::*;

    const DIM: usize = 8;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn sqlite_agrees_with_in_memory(
            entries in proptest::collection::vec(arb_entry(DIM), 1..12),
            query in arb_normalized_embedding(DIM),
            top_k in 1usize..15,
        ) {
            let dir = tempfile::tempdir().unwrap();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (durable, in_memory) = rt.block_on(async {
                let sqlite = SqliteVectorStore::open(dir.path()).await.unwrap();
                let memory = InMemoryVectorStore::new();
                (
                    search_and_count(&sqlite, &entries, &query, top_k).await,
                    search_and_count(&memory, &entries, &query, top_k).await,
                )
            });

            prop_assert_eq!(durable.1, in_memory.1);
            prop_assert_eq!(durable.0.len(), in_memory.0.len());
            for (a, b) in durable.0.iter().zip(&in_memory.0) {
                prop_assert!((a.distance - b.distance).abs() < 1e-5);
            }
        }
    }
}
