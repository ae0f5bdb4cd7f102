//! The context engine entry points.
//!
//! [`ContextEngine`] wires the classifier, the directory resolver, the
//! semantic retriever and the composer together. Its query-side methods
//! never fail: every error is logged and degrades to "no augmentation", so a
//! caller can always fall back to answering from general knowledge.
//!
//! # Example
//!
//! ```rust,ignore
//! use derma_rag::{ContextEngine, HashingEmbeddingProvider, RagConfig};
//!
//! let engine = ContextEngine::open(
//!     RagConfig::rooted_at("database"),
//!     Arc::new(HashingEmbeddingProvider::default()),
//! )
//! .await?;
//!
//! let enhanced = engine.enhance_prompt("Melanoma có nguy hiểm không?", SYSTEM_PROMPT).await;
//! ```

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::classifier::QueryClassifier;
use crate::composer::{EnhancedPrompt, PromptComposer};
use crate::config::RagConfig;
use crate::corpus::{DirectoryDataset, KnowledgeCorpus};
use crate::directory::DirectoryResolver;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::images::ImageResolver;
use crate::index::EmbeddingIndex;
use crate::record::{KnowledgeRecord, QueryRoute, RetrievalResult};
use crate::retriever::SemanticRetriever;

/// Routes queries, retrieves context and composes prompts.
///
/// Queries share the index; [`append_entity`](Self::append_entity) and
/// [`rebuild_index`](Self::rebuild_index) take it exclusively.
pub struct ContextEngine {
    config: RagConfig,
    corpus: KnowledgeCorpus,
    classifier: QueryClassifier,
    directory: DirectoryResolver,
    retriever: SemanticRetriever,
    composer: PromptComposer,
    index: RwLock<EmbeddingIndex>,
}

impl ContextEngine {
    /// Open the index at `config.index_path` and build it if it is empty or
    /// was built by an embedder of different dimensionality.
    ///
    /// A durable index that cannot be opened is replaced by an in-memory one;
    /// a failed initial build is logged and retried on the first knowledge
    /// query.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `config` is invalid.
    pub async fn open(config: RagConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        let index = EmbeddingIndex::open(&config, provider).await;
        Self::with_index(config, index).await
    }

    /// Create an engine over an already opened index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `config` is invalid.
    pub async fn with_index(config: RagConfig, index: EmbeddingIndex) -> Result<Self> {
        config.validate()?;
        let corpus = KnowledgeCorpus::new(&config.knowledge_path);
        let images = ImageResolver::new(
            corpus.clone(),
            &config.asset_root,
            config.max_images_per_entity,
            config.min_fuzzy_match_len,
        );
        let engine = Self {
            directory: DirectoryResolver::new(DirectoryDataset::new(&config.directory_path)),
            retriever: SemanticRetriever::new(images, config.distance_threshold),
            classifier: QueryClassifier::new(),
            composer: PromptComposer::new(),
            index: RwLock::new(index),
            corpus,
            config,
        };

        let index = engine.index.read().await;
        info!(backend = index.backend(), collection = index.collection(), "context engine ready");
        let stale = index.needs_rebuild().await;
        drop(index);
        if stale {
            engine.build_if_stale().await;
        }
        Ok(engine)
    }

    /// The configuration in use.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// The retrieval branch `query` would take.
    pub fn classify(&self, query: &str) -> QueryRoute {
        self.classifier.route(query)
    }

    /// Number of indexed chunks, or `0` if the index cannot be read.
    pub async fn indexed_chunks(&self) -> usize {
        self.index.read().await.count().await.unwrap_or_default()
    }

    /// Context and images for `query`.
    ///
    /// Directory queries take priority over knowledge queries; queries that
    /// are neither get no retrieval at all.
    pub async fn retrieve_context(&self, query: &str) -> RetrievalResult {
        let route = self.classifier.route(query);
        match route {
            QueryRoute::Directory => self.retrieve_directory(query).await,
            QueryRoute::Knowledge => self.retrieve_knowledge(query).await,
            QueryRoute::Skip => RetrievalResult { route: Some(route), ..Default::default() },
        }
    }

    async fn retrieve_directory(&self, query: &str) -> RetrievalResult {
        let context = match self.directory.resolve(query).await {
            Ok(context) => context,
            Err(e) => {
                let e = RagError::RetrievalFailure(e.to_string());
                error!(error = %e, "directory lookup failed");
                None
            }
        };
        RetrievalResult { route: Some(QueryRoute::Directory), context, images: None }
    }

    async fn retrieve_knowledge(&self, query: &str) -> RetrievalResult {
        if self.index.read().await.needs_rebuild().await {
            self.build_if_stale().await;
        }

        let index = self.index.read().await;
        match self.retriever.retrieve(&index, query, self.config.top_k).await {
            Ok(result) => RetrievalResult { route: Some(QueryRoute::Knowledge), ..result },
            Err(e) => {
                error!(error = %e, "semantic retrieval failed");
                RetrievalResult { route: Some(QueryRoute::Knowledge), ..Default::default() }
            }
        }
    }

    /// `base_prompt` augmented with context for `query`, plus supporting images.
    pub async fn enhance_prompt(&self, query: &str, base_prompt: &str) -> EnhancedPrompt {
        let result = self.retrieve_context(query).await;
        self.composer.compose(base_prompt, result)
    }

    /// The first corpus record whose names contain `name`, ignoring case.
    pub async fn get_entity_info(&self, name: &str) -> Option<KnowledgeRecord> {
        match self.corpus.find(name).await {
            Ok(record) => record,
            Err(e) => {
                error!(error = %e, "entity lookup failed");
                None
            }
        }
    }

    /// Append `record` to the corpus, persist it and rebuild the index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::MalformedRecord`] if `record` has no name or danger
    /// label, and [`RagError::ReindexFailure`] if the corpus cannot be written
    /// or the rebuild fails. A failed rebuild leaves the index to be rebuilt
    /// on the next knowledge query.
    pub async fn append_entity(&self, record: KnowledgeRecord) -> Result<()> {
        let index = self.index.write().await;

        let total = self.corpus.append(&record).await.map_err(|e| {
            let e = reindex_failure(e);
            error!(entity = record.primary_name(), error = %e, "failed to append entity");
            e
        })?;
        info!(entity = record.primary_name(), records = total, "appended entity to corpus");

        self.rebuild_locked(&index).await.map(|_| ())
    }

    /// Rebuild the index from the corpus on disk. Returns the chunk count.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ReindexFailure`] if the corpus cannot be read or
    /// the rebuild fails.
    pub async fn rebuild_index(&self) -> Result<usize> {
        let index = self.index.write().await;
        self.rebuild_locked(&index).await
    }

    async fn build_if_stale(&self) {
        let index = self.index.write().await;
        if !index.needs_rebuild().await {
            debug!("index was rebuilt concurrently");
            return;
        }
        // Already logged.
        let _ = self.rebuild_locked(&index).await;
    }

    async fn rebuild_locked(&self, index: &EmbeddingIndex) -> Result<usize> {
        let outcome = match self.corpus.load().await {
            Ok(records) => index.build(&records).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(chunks) => {
                info!(chunks, "rebuilt knowledge index");
                Ok(chunks)
            }
            Err(e) => {
                let e = reindex_failure(e);
                error!(error = %e, "knowledge index rebuild failed");
                Err(e)
            }
        }
    }
}

fn reindex_failure(e: RagError) -> RagError {
    match e {
        RagError::ReindexFailure(_) | RagError::MalformedRecord { .. } => e,
        other => RagError::ReindexFailure(other.to_string()),
    }
}
