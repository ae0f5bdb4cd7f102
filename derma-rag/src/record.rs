//! Data types for knowledge records, directory entries, chunks, and retrieval results.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{RagError, Result};

/// One knowledge entity (a disease) with its names, severity and advice lists.
///
/// The corpus stores the name either as a single string or as a list of
/// synonyms. Both shapes are normalized on ingestion into `names`, whose
/// first element is the primary name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeRecord {
    /// Display names, primary first. Never empty for a validated record.
    pub names: Vec<String>,
    /// Danger / severity label.
    pub danger_level: String,
    /// Symptom descriptions, in corpus order.
    pub symptoms: Vec<String>,
    /// Recommended actions ("what to do").
    pub recommended_actions: Vec<String>,
    /// Precautions ("what not to do").
    pub precautions: Vec<String>,
    /// Image file references, relative to the asset root or absolute.
    pub images: Vec<String>,
}

/// The two shapes a record's name field takes in the corpus.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
enum NameField {
    One(String),
    Many(Vec<String>),
}

impl NameField {
    fn into_names(self) -> Vec<String> {
        let names = match self {
            NameField::One(name) => vec![name],
            NameField::Many(names) => names,
        };
        names.into_iter().map(|n| n.trim().to_string()).filter(|n| !n.is_empty()).collect()
    }
}

/// Wire shape of a corpus record, keyed the way the dataset file is.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "tên bệnh", alias = "names", alias = "name", default)]
    names: Option<NameField>,
    #[serde(rename = "độ nguy hiểm", alias = "danger_level", default)]
    danger_level: Option<String>,
    #[serde(rename = "triệu chứng", alias = "symptoms", default)]
    symptoms: Option<Vec<String>>,
    #[serde(rename = "nên làm gì", alias = "recommended_actions", default)]
    recommended_actions: Option<Vec<String>>,
    #[serde(rename = "không nên làm gì", alias = "precautions", default)]
    precautions: Option<Vec<String>>,
    #[serde(rename = "hình ảnh", alias = "images", default)]
    images: Option<Vec<String>>,
}

#[derive(Serialize)]
struct StoredRecord<'a> {
    #[serde(rename = "tên bệnh")]
    names: NameRef<'a>,
    #[serde(rename = "độ nguy hiểm")]
    danger_level: &'a str,
    #[serde(rename = "triệu chứng")]
    symptoms: &'a [String],
    #[serde(rename = "nên làm gì")]
    recommended_actions: &'a [String],
    #[serde(rename = "không nên làm gì")]
    precautions: &'a [String],
    #[serde(rename = "hình ảnh", skip_serializing_if = "no_images")]
    images: &'a [String],
}

fn no_images(images: &&[String]) -> bool {
    images.is_empty()
}

#[derive(Serialize)]
#[serde(untagged)]
enum NameRef<'a> {
    One(&'a str),
    Many(&'a [String]),
}

impl KnowledgeRecord {
    /// Create a record with the given names and danger label and no list content.
    pub fn new(names: Vec<String>, danger_level: impl Into<String>) -> Self {
        Self {
            names,
            danger_level: danger_level.into(),
            symptoms: Vec::new(),
            recommended_actions: Vec::new(),
            precautions: Vec::new(),
            images: Vec::new(),
        }
    }

    /// Set the symptom list.
    pub fn with_symptoms(mut self, symptoms: Vec<String>) -> Self {
        self.symptoms = symptoms;
        self
    }

    /// Set the recommended-action list.
    pub fn with_recommended_actions(mut self, actions: Vec<String>) -> Self {
        self.recommended_actions = actions;
        self
    }

    /// Set the precaution list.
    pub fn with_precautions(mut self, precautions: Vec<String>) -> Self {
        self.precautions = precautions;
        self
    }

    /// Set the image references.
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// Parse one corpus entry, normalizing the name field.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::MalformedRecord`] if the entry is not an object of
    /// the expected shape, or lacks a name or danger label.
    pub fn from_value(index: usize, value: serde_json::Value) -> Result<Self> {
        let raw: RawRecord = serde_json::from_value(value)
            .map_err(|e| RagError::MalformedRecord { index, reason: e.to_string() })?;

        let record = Self {
            names: raw.names.map(NameField::into_names).unwrap_or_default(),
            danger_level: raw.danger_level.map(|d| d.trim().to_string()).unwrap_or_default(),
            symptoms: raw.symptoms.unwrap_or_default(),
            recommended_actions: raw.recommended_actions.unwrap_or_default(),
            precautions: raw.precautions.unwrap_or_default(),
            images: raw.images.unwrap_or_default(),
        };
        record.validate(index)?;
        Ok(record)
    }

    /// Check the record invariants: at least one name and a danger label.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::MalformedRecord`] naming the missing field.
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.names.iter().all(|n| n.trim().is_empty()) {
            return Err(RagError::MalformedRecord { index, reason: "missing name".to_string() });
        }
        if self.danger_level.trim().is_empty() {
            return Err(RagError::MalformedRecord {
                index,
                reason: "missing danger label".to_string(),
            });
        }
        Ok(())
    }

    /// The primary name (`names[0]`), or `""` for an unvalidated empty record.
    pub fn primary_name(&self) -> &str {
        self.names.first().map(String::as_str).unwrap_or_default()
    }

    /// All names joined in list order.
    pub fn all_names(&self) -> String {
        self.names.join(", ")
    }

    /// The list field backing a chunk category. `MainInfo` has none.
    pub fn items(&self, category: ChunkCategory) -> &[String] {
        match category {
            ChunkCategory::MainInfo => &[],
            ChunkCategory::Symptoms => &self.symptoms,
            ChunkCategory::Treatment => &self.recommended_actions,
            ChunkCategory::Precautions => &self.precautions,
        }
    }

    /// Whether any of the record's names equals `name`, ignoring case.
    pub fn has_name(&self, name: &str) -> bool {
        let needle = name.trim().to_lowercase();
        self.names.iter().any(|n| n.to_lowercase() == needle)
    }

    /// Whether `fragment` occurs in any of the record's names, ignoring case.
    pub fn name_contains(&self, fragment: &str) -> bool {
        let needle = fragment.trim().to_lowercase();
        !needle.is_empty() && self.names.iter().any(|n| n.to_lowercase().contains(&needle))
    }
}

impl Serialize for KnowledgeRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let names = match self.names.as_slice() {
            [single] => NameRef::One(single),
            many => NameRef::Many(many),
        };
        StoredRecord {
            names,
            danger_level: &self.danger_level,
            symptoms: &self.symptoms,
            recommended_actions: &self.recommended_actions,
            precautions: &self.precautions,
            images: &self.images,
        }
        .serialize(serializer)
    }
}

/// Placeholders that mean "no website" in the directory dataset.
const NULL_PLACEHOLDERS: &[&str] = &["", "-", "n/a", "na", "null", "none", "không có"];

/// One facility in the directory dataset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Facility name.
    pub name: String,
    /// Street address.
    #[serde(default)]
    pub address: String,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Website, possibly a null placeholder such as `"N/A"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Map link or location string.
    #[serde(
        default,
        alias = "google_map",
        alias = "map",
        skip_serializing_if = "Option::is_none"
    )]
    pub map_location: Option<String>,
    /// District / region label, possibly compound ("Đống Đa (gần Ba Đình)").
    #[serde(default, alias = "region")]
    pub district: String,
    /// Nearby area labels.
    #[serde(default, alias = "nearby", alias = "nearby_districts")]
    pub nearby_areas: Vec<String>,
}

impl DirectoryEntry {
    /// The phone number, if present and non-blank.
    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    /// The website, unless missing or a null placeholder.
    pub fn website(&self) -> Option<&str> {
        self.website
            .as_deref()
            .map(str::trim)
            .filter(|w| !NULL_PLACEHOLDERS.contains(&w.to_lowercase().as_str()))
    }

    /// The map location, if present and non-blank.
    pub fn map_location(&self) -> Option<&str> {
        self.map_location.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// The field-group a chunk was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkCategory {
    MainInfo,
    Symptoms,
    Treatment,
    Precautions,
}

impl ChunkCategory {
    /// Categories in chunking order.
    pub const ALL: [ChunkCategory; 4] = [
        ChunkCategory::MainInfo,
        ChunkCategory::Symptoms,
        ChunkCategory::Treatment,
        ChunkCategory::Precautions,
    ];

    /// The tag stored in index metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            ChunkCategory::MainInfo => "main_info",
            ChunkCategory::Symptoms => "symptoms",
            ChunkCategory::Treatment => "treatment",
            ChunkCategory::Precautions => "precautions",
        }
    }
}

impl fmt::Display for ChunkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkCategory {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        ChunkCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| RagError::RetrievalFailure(format!("unknown chunk category '{s}'")))
    }
}

/// A unit of indexed text derived from one field-group of a record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Stable id, `<record-index>_<chunk-index>`.
    pub id: String,
    /// The chunk body.
    pub text: String,
    /// Field-group the chunk came from.
    pub category: ChunkCategory,
    /// Primary name of the source record.
    pub entity_name: String,
    /// Danger label of the source record.
    pub danger_level: String,
    /// Position of the source record in the corpus.
    pub record_index: usize,
}

/// A [`Chunk`] with its embedding, as written to the vector store.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// A stored chunk returned by a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// Cosine distance to the query in `[0, 2]`; lower is more similar.
    pub distance: f32,
}

/// Which retrieval branch a query was routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryRoute {
    /// Facility / location lookup.
    Directory,
    /// Semantic search over the knowledge index.
    Knowledge,
    /// No retrieval.
    Skip,
}

/// The outcome of routing and retrieving for one query. Never persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RetrievalResult {
    /// Branch that produced the result, `None` if the query was not routed.
    pub route: Option<QueryRoute>,
    /// Context text ready for prompt injection.
    pub context: Option<String>,
    /// Supporting images, in entity-discovery order.
    pub images: Option<Vec<PathBuf>>,
}

impl RetrievalResult {
    /// A result with no context and no images.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether there is no context to inject.
    pub fn is_empty(&self) -> bool {
        self.context.is_none()
    }
}
