//! Error types for the `derma-rag` crate.

use thiserror::Error;

/// Errors that can occur while indexing, retrieving, or composing context.
///
/// None of these is meant to reach an end user. The [`ContextEngine`](crate::ContextEngine)
/// entry points log them and degrade to "no augmentation".
#[derive(Debug, Error)]
pub enum RagError {
    /// A corpus entry is missing its name or danger label.
    #[error("Malformed record at index {index}: {reason}")]
    MalformedRecord {
        /// Position of the record in the corpus.
        index: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// The durable vector store could not be opened.
    #[error("Index unavailable ({backend}): {message}")]
    IndexUnavailable {
        /// The backend that failed to open.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A query against the index or a dataset failed.
    #[error("Retrieval failure: {0}")]
    RetrievalFailure(String),

    /// Appending to the corpus or rebuilding the index failed part-way.
    #[error("Reindex failure: {0}")]
    ReindexFailure(String),

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// Reading, parsing, or writing a dataset file failed.
    #[error("Corpus error ({path}): {message}")]
    CorpusError {
        /// The dataset file involved.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    pub(crate) fn vector_store(backend: &str, message: impl std::fmt::Display) -> Self {
        Self::VectorStoreError { backend: backend.to_string(), message: message.to_string() }
    }

    pub(crate) fn corpus(path: &std::path::Path, message: impl std::fmt::Display) -> Self {
        Self::CorpusError { path: path.display().to_string(), message: message.to_string() }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
