//! Retrieval-augmented context for a dermatology assistant.
//!
//! For each free-text query the engine decides whether to inject domain
//! knowledge into the downstream generation prompt, and which kind:
//!
//! - **Directory queries** (facilities, locations) are answered by a
//!   rule-based region lookup over the facility dataset.
//! - **Knowledge queries** (diseases, symptoms, treatment) are answered by
//!   semantic search over an embedding index of chunked disease records,
//!   with supporting images.
//! - Anything else gets no retrieval.
//!
//! # Features
//!
//! - `sqlite` (default): durable index backed by SQLite via `sqlx`.
//! - `remote`: embeddings from an OpenAI-compatible HTTP endpoint via `reqwest`.
//!
//! Without `sqlite` the index lives in memory and is rebuilt on start.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use derma_rag::{ContextEngine, HashingEmbeddingProvider, RagConfig};
//!
//! let engine = ContextEngine::open(
//!     RagConfig::rooted_at("database"),
//!     Arc::new(HashingEmbeddingProvider::default()),
//! )
//! .await?;
//!
//! let result = engine.retrieve_context("Triệu chứng của vảy nến là gì?").await;
//! if let Some(context) = result.context {
//!     println!("{context}");
//! }
//! ```

pub mod chunking;
pub mod classifier;
pub mod composer;
pub mod config;
pub mod corpus;
pub mod directory;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod images;
pub mod index;
pub mod inmemory;
pub mod record;
pub mod retriever;
pub mod vectorstore;

#[cfg(feature = "remote")]
pub mod remote;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use chunking::{RecordChunker, RecordChunks, count_tokens};
pub use classifier::QueryClassifier;
pub use composer::{EnhancedPrompt, PromptComposer};
pub use config::{RagConfig, RagConfigBuilder};
pub use corpus::{DirectoryDataset, KnowledgeCorpus};
pub use directory::{DirectoryResolver, REGIONS};
pub use embedding::EmbeddingProvider;
pub use engine::ContextEngine;
pub use error::{RagError, Result};
pub use hashing::HashingEmbeddingProvider;
pub use images::ImageResolver;
pub use index::EmbeddingIndex;
pub use inmemory::InMemoryVectorStore;
pub use record::{
    Chunk, ChunkCategory, DirectoryEntry, IndexEntry, KnowledgeRecord, QueryRoute,
    RetrievalResult, SearchHit,
};
pub use retriever::{CONTEXT_HEADER, SemanticRetriever};
pub use vectorstore::{VectorStore, cosine_distance};

#[cfg(feature = "remote")]
pub use remote::RemoteEmbeddingProvider;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVectorStore;
