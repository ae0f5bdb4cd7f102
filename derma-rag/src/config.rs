//! Configuration for the context engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Configuration parameters for indexing and retrieval.
///
/// Every field has a default, so a JSON config file only needs to name the
/// values it overrides. See [`RagConfig::from_json_file`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Knowledge corpus file (JSON array of disease records).
    pub knowledge_path: PathBuf,
    /// Directory dataset file (JSON array of facilities).
    pub directory_path: PathBuf,
    /// Base directory for relative image references in the corpus.
    pub asset_root: PathBuf,
    /// On-disk location of the durable vector collection.
    pub index_path: PathBuf,
    /// Name of the vector collection.
    pub collection: String,
    /// Maximum tokens per chunk.
    pub max_chunk_tokens: usize,
    /// Number of chunks embedded and written per batch.
    pub batch_size: usize,
    /// Number of nearest chunks fetched per semantic query.
    pub top_k: usize,
    /// Chunks at or above this cosine distance are discarded.
    pub distance_threshold: f32,
    /// Maximum number of images returned per entity.
    pub max_images_per_entity: usize,
    /// Minimum length, in characters, for substring image matching.
    pub min_fuzzy_match_len: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            knowledge_path: PathBuf::from("database/diseases.json"),
            directory_path: PathBuf::from("database/hospitals.json"),
            asset_root: PathBuf::from("."),
            index_path: PathBuf::from("database/index"),
            collection: "disease_knowledge".to_string(),
            max_chunk_tokens: 500,
            batch_size: 100,
            top_k: 5,
            distance_threshold: 0.7,
            max_images_per_entity: 3,
            min_fuzzy_match_len: 4,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Load a config file, filling omitted fields with defaults, then validate it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CorpusError`] if the file cannot be read or parsed,
    /// and [`RagError::ConfigError`] if the values are inconsistent.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| RagError::corpus(path, e))?;
        let config: RagConfig =
            serde_json::from_str(&raw).map_err(|e| RagError::corpus(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `max_chunk_tokens`, `batch_size` or `top_k` is zero
    /// - `distance_threshold` is outside `(0, 2]`
    /// - `collection` is empty
    pub fn validate(&self) -> Result<()> {
        if self.max_chunk_tokens == 0 {
            return Err(RagError::ConfigError(
                "max_chunk_tokens must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(RagError::ConfigError("batch_size must be greater than zero".to_string()));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if !(self.distance_threshold > 0.0 && self.distance_threshold <= 2.0) {
            return Err(RagError::ConfigError(format!(
                "distance_threshold ({}) must be in (0, 2]",
                self.distance_threshold
            )));
        }
        if self.collection.trim().is_empty() {
            return Err(RagError::ConfigError("collection name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Point every data path at `dir`, using the default file names.
    ///
    /// Handy for tests and for the CLI's `--data-dir` flag.
    pub fn rooted_at(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            knowledge_path: dir.join("diseases.json"),
            directory_path: dir.join("hospitals.json"),
            asset_root: dir.to_path_buf(),
            index_path: dir.join("index"),
            ..Self::default()
        }
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Start from an existing config instead of the defaults.
    pub fn from_config(config: RagConfig) -> Self {
        Self { config }
    }

    /// Set the knowledge corpus file.
    pub fn knowledge_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.knowledge_path = path.into();
        self
    }

    /// Set the directory dataset file.
    pub fn directory_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.directory_path = path.into();
        self
    }

    /// Set the base directory for relative image references.
    pub fn asset_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.asset_root = path.into();
        self
    }

    /// Set the on-disk index location.
    pub fn index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.index_path = path.into();
        self
    }

    /// Set the collection name.
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.config.collection = name.into();
        self
    }

    /// Set the per-chunk token budget.
    pub fn max_chunk_tokens(mut self, tokens: usize) -> Self {
        self.config.max_chunk_tokens = tokens;
        self
    }

    /// Set the indexing batch size.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the number of nearest chunks fetched per query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the exclusive cosine-distance cutoff.
    pub fn distance_threshold(mut self, threshold: f32) -> Self {
        self.config.distance_threshold = threshold;
        self
    }

    /// Set the per-entity image cap.
    pub fn max_images_per_entity(mut self, cap: usize) -> Self {
        self.config.max_images_per_entity = cap;
        self
    }

    /// Set the minimum length for substring image matching.
    pub fn min_fuzzy_match_len(mut self, len: usize) -> Self {
        self.config.min_fuzzy_match_len = len;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
