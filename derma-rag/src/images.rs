//! Supporting-image lookup for retrieved entities.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::corpus::KnowledgeCorpus;
use crate::error::Result;
use crate::record::KnowledgeRecord;

/// Finds image files for an entity name in the knowledge corpus.
///
/// Exact (case-insensitive) name matches are tried first. Only if they yield
/// no usable file does the resolver fall back to substring matching, and then
/// only between names at least `min_fuzzy_match_len` characters long.
#[derive(Debug, Clone)]
pub struct ImageResolver {
    corpus: KnowledgeCorpus,
    asset_root: PathBuf,
    max_images: usize,
    min_fuzzy_match_len: usize,
}

impl ImageResolver {
    pub fn new(
        corpus: KnowledgeCorpus,
        asset_root: impl Into<PathBuf>,
        max_images: usize,
        min_fuzzy_match_len: usize,
    ) -> Self {
        Self { corpus, asset_root: asset_root.into(), max_images, min_fuzzy_match_len }
    }

    /// Existing image files for `entity_name`, at most `max_images`.
    ///
    /// The corpus is re-read on every call.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CorpusError`](crate::RagError::CorpusError) if the
    /// corpus cannot be read.
    pub async fn resolve(&self, entity_name: &str) -> Result<Vec<PathBuf>> {
        if self.max_images == 0 || entity_name.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records = self.corpus.load().await?;

        let exact = self.existing(records.iter().filter(|r| r.has_name(entity_name))).await;
        if !exact.is_empty() {
            return Ok(exact);
        }

        let fuzzy = self
            .existing(records.iter().filter(|r| self.fuzzy_match(r, entity_name)))
            .await;
        if !fuzzy.is_empty() {
            debug!(entity = entity_name, images = fuzzy.len(), "images found by substring match");
        }
        Ok(fuzzy)
    }

    fn fuzzy_match(&self, record: &KnowledgeRecord, entity_name: &str) -> bool {
        let needle = entity_name.trim().to_lowercase();
        if needle.chars().count() < self.min_fuzzy_match_len {
            return false;
        }
        record.names.iter().any(|name| {
            let name = name.trim().to_lowercase();
            name.chars().count() >= self.min_fuzzy_match_len
                && (name.contains(&needle) || needle.contains(&name))
        })
    }

    async fn existing<'a>(
        &self,
        records: impl Iterator<Item = &'a KnowledgeRecord>,
    ) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for reference in records.flat_map(|r| r.images.iter()) {
            if found.len() == self.max_images {
                break;
            }
            let path = self.locate(reference);
            match tokio::fs::try_exists(&path).await {
                Ok(true) if !found.contains(&path) => found.push(path),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "could not check image file"),
            }
        }
        found
    }

    fn locate(&self, reference: &str) -> PathBuf {
        let path = Path::new(reference);
        if path.is_absolute() { path.to_path_buf() } else { self.asset_root.join(path) }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Fixture {
        _dir: tempfile::TempDir,
        resolver: ImageResolver,
        root: PathBuf,
    }

    fn fixture(corpus: serde_json::Value, files: &[&str]) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("images")).unwrap();
        for file in files {
            std::fs::write(root.join(file), b"png").unwrap();
        }
        let corpus_path = root.join("diseases.json");
        std::fs::write(&corpus_path, corpus.to_string()).unwrap();

        let resolver = ImageResolver::new(KnowledgeCorpus::new(corpus_path), &root, 3, 4);
        Fixture { _dir: dir, resolver, root }
    }

    #[tokio::test]
    async fn exact_match_keeps_only_existing_files_up_to_cap() {
        let fx = fixture(
            json!([{
                "tên bệnh": ["Melanoma", "Ung thư hắc tố"],
                "độ nguy hiểm": "Cao",
                "hình ảnh": ["images/m1.png", "images/missing.png", "images/m2.png",
                             "images/m3.png", "images/m4.png"]
            }]),
            &["images/m1.png", "images/m2.png", "images/m3.png", "images/m4.png"],
        );

        let images = fx.resolver.resolve("melanoma").await.unwrap();
        assert_eq!(
            images,
            vec![
                fx.root.join("images/m1.png"),
                fx.root.join("images/m2.png"),
                fx.root.join("images/m3.png")
            ]
        );
    }

    #[tokio::test]
    async fn substring_fallback_requires_minimum_length() {
        let fx = fixture(
            json!([
                { "tên bệnh": "Actinic keratosis", "độ nguy hiểm": "Trung bình",
                  "hình ảnh": ["images/ak.png"] },
                { "tên bệnh": "Nấm", "độ nguy hiểm": "Thấp", "hình ảnh": ["images/nam.png"] }
            ]),
            &["images/ak.png", "images/nam.png"],
        );

        let images = fx.resolver.resolve("Keratosis").await.unwrap();
        assert_eq!(images, vec![fx.root.join("images/ak.png")]);

        assert!(fx.resolver.resolve("Nấm da").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exact_match_without_files_falls_back() {
        let fx = fixture(
            json!([
                { "tên bệnh": "Eczema", "độ nguy hiểm": "Thấp", "hình ảnh": ["images/gone.png"] },
                { "tên bệnh": "Eczema thể tạng", "độ nguy hiểm": "Thấp",
                  "hình ảnh": ["images/atopic.png"] }
            ]),
            &["images/atopic.png"],
        );

        let images = fx.resolver.resolve("Eczema").await.unwrap();
        assert_eq!(images, vec![fx.root.join("images/atopic.png")]);
    }

    #[tokio::test]
    async fn unknown_entity_has_no_images() {
        let fx = fixture(json!([]), &[]);
        assert!(fx.resolver.resolve("Psoriasis").await.unwrap().is_empty());
    }
}
