//! Flat-file datasets: the knowledge corpus and the facility directory.
//!
//! Both are JSON arrays read in full on every call, so edits to the files are
//! picked up without restarting the engine.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{RagError, Result};
use crate::record::{DirectoryEntry, KnowledgeRecord};

async fn read_array(path: &Path) -> Result<Vec<Value>> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| RagError::corpus(path, e))?;
    serde_json::from_str(&raw).map_err(|e| RagError::corpus(path, e))
}

/// The knowledge corpus file.
#[derive(Debug, Clone)]
pub struct KnowledgeCorpus {
    path: PathBuf,
}

impl KnowledgeCorpus {
    /// Create a handle for the corpus at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the corpus file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every well-formed record, in file order.
    ///
    /// Malformed entries are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CorpusError`] if the file cannot be read or is not
    /// a JSON array.
    pub async fn load(&self) -> Result<Vec<KnowledgeRecord>> {
        let values = read_array(&self.path).await?;
        let total = values.len();
        let records: Vec<KnowledgeRecord> = values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match KnowledgeRecord::from_value(index, value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "skipping corpus entry");
                    None
                }
            })
            .collect();
        debug!(
            path = %self.path.display(),
            total,
            loaded = records.len(),
            "loaded knowledge corpus"
        );
        Ok(records)
    }

    /// Find the first record one of whose names contains `name`, ignoring case.
    ///
    /// # Errors
    ///
    /// Propagates [`load`](Self::load) errors.
    pub async fn find(&self, name: &str) -> Result<Option<KnowledgeRecord>> {
        Ok(self.load().await?.into_iter().find(|record| record.name_contains(name)))
    }

    /// Append `record` to the file and persist it.
    ///
    /// Existing entries, malformed ones included, are written back untouched.
    /// A missing file is treated as an empty corpus.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::MalformedRecord`] if `record` is invalid, and
    /// [`RagError::CorpusError`] if reading or writing fails.
    pub async fn append(&self, record: &KnowledgeRecord) -> Result<usize> {
        let mut values = match tokio::fs::try_exists(&self.path).await {
            Ok(true) => read_array(&self.path).await?,
            Ok(false) => Vec::new(),
            Err(e) => return Err(RagError::corpus(&self.path, e)),
        };
        record.validate(values.len())?;

        values.push(serde_json::to_value(record).map_err(|e| RagError::corpus(&self.path, e))?);
        let body =
            serde_json::to_string_pretty(&values).map_err(|e| RagError::corpus(&self.path, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| RagError::corpus(parent, e))?;
        }
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, body).await.map_err(|e| RagError::corpus(&staging, e))?;
        tokio::fs::rename(&staging, &self.path).await.map_err(|e| RagError::corpus(&self.path, e))?;

        Ok(values.len())
    }
}

/// The facility directory file.
#[derive(Debug, Clone)]
pub struct DirectoryDataset {
    path: PathBuf,
}

impl DirectoryDataset {
    /// Create a handle for the dataset at `path`. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the dataset file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every well-formed entry, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CorpusError`] if the file cannot be read or is not
    /// a JSON array.
    pub async fn load(&self) -> Result<Vec<DirectoryEntry>> {
        let values = read_array(&self.path).await?;
        Ok(values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        index,
                        error = %e,
                        "skipping directory entry"
                    );
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn malformed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diseases.json");
        let body = json!([
            { "tên bệnh": "Melanoma", "độ nguy hiểm": "Cao" },
            { "tên bệnh": "Không có mức độ" },
            { "tên bệnh": ["Psoriasis", "Vảy nến"], "độ nguy hiểm": "Trung bình" }
        ]);
        std::fs::write(&path, body.to_string()).unwrap();

        let records = KnowledgeCorpus::new(&path).load().await.unwrap();
        let names: Vec<&str> = records.iter().map(KnowledgeRecord::primary_name).collect();
        assert_eq!(names, vec!["Melanoma", "Psoriasis"]);
    }

    #[tokio::test]
    async fn find_matches_any_name_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diseases.json");
        let body = json!([{ "tên bệnh": ["Psoriasis", "Vảy nến"], "độ nguy hiểm": "Trung bình" }]);
        std::fs::write(&path, body.to_string()).unwrap();

        let corpus = KnowledgeCorpus::new(&path);
        assert!(corpus.find("vảy NẾN").await.unwrap().is_some());
        assert!(corpus.find("psori").await.unwrap().is_some());
        assert!(corpus.find("Melanoma").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn append_keeps_existing_entries_and_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("diseases.json");
        let corpus = KnowledgeCorpus::new(&path);

        let first = KnowledgeRecord::new(vec!["Melanoma".into()], "Cao");
        let second = KnowledgeRecord::new(vec!["Nevus".into(), "Nốt ruồi".into()], "Thấp");
        assert_eq!(corpus.append(&first).await.unwrap(), 1);
        assert_eq!(corpus.append(&second).await.unwrap(), 2);

        let records = corpus.load().await.unwrap();
        assert_eq!(records, vec![first, second]);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("Nốt ruồi"), "non-ASCII text should be written verbatim");
    }

    #[tokio::test]
    async fn append_rejects_invalid_record() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = KnowledgeCorpus::new(dir.path().join("diseases.json"));
        let invalid = KnowledgeRecord::new(Vec::new(), "Cao");
        assert!(matches!(corpus.append(&invalid).await, Err(RagError::MalformedRecord { .. })));
    }

    #[tokio::test]
    async fn missing_directory_file_is_a_corpus_error() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = DirectoryDataset::new(dir.path().join("hospitals.json"));
        assert!(matches!(dataset.load().await, Err(RagError::CorpusError { .. })));
    }
}
