//! Record chunking.
//!
//! A [`KnowledgeRecord`] is split into chunks by field-group, in the fixed
//! order `main_info`, `symptoms`, `treatment`, `precautions`. List groups that
//! would exceed the token budget are split at item boundaries into several
//! chunks of the same category.

use unicode_segmentation::UnicodeSegmentation;

use crate::error::Result;
use crate::record::{Chunk, ChunkCategory, KnowledgeRecord};

/// Approximate token count: the number of Unicode words in `text`.
pub fn count_tokens(text: &str) -> usize {
    text.unicode_words().count()
}

/// Splits knowledge records into token-bounded chunks.
///
/// Chunk IDs are generated as `{record_index}_{chunk_index}`, where the chunk
/// index counts every chunk the record produced so far, split pieces included.
///
/// # Example
///
/// ```rust,ignore
/// use derma_rag::RecordChunker;
///
/// let chunker = RecordChunker::new(500);
/// for chunk in chunker.chunks(0, &record)? {
///     println!("{} {}", chunk.id, chunk.category);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RecordChunker {
    max_tokens: usize,
}

impl RecordChunker {
    /// Create a new `RecordChunker` with the given per-chunk token budget.
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens: max_tokens.max(1) }
    }

    /// The per-chunk token budget.
    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    /// Lazily chunk one record.
    ///
    /// The returned iterator is finite; call `chunks` again (or clone the
    /// iterator) to restart.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::MalformedRecord`](crate::RagError::MalformedRecord)
    /// if the record has no name or no danger label.
    pub fn chunks<'a>(
        &'a self,
        record_index: usize,
        record: &'a KnowledgeRecord,
    ) -> Result<RecordChunks<'a>> {
        record.validate(record_index)?;
        Ok(RecordChunks {
            max_tokens: self.max_tokens,
            record,
            record_index,
            section: 0,
            item_cursor: 0,
            chunk_index: 0,
        })
    }
}

/// Lazy iterator over the chunks of one record.
#[derive(Debug, Clone)]
pub struct RecordChunks<'a> {
    max_tokens: usize,
    record: &'a KnowledgeRecord,
    record_index: usize,
    section: usize,
    item_cursor: usize,
    chunk_index: usize,
}

impl RecordChunks<'_> {
    fn emit(&mut self, category: ChunkCategory, text: String) -> Chunk {
        let chunk = Chunk {
            id: format!("{}_{}", self.record_index, self.chunk_index),
            text,
            category,
            entity_name: self.record.primary_name().to_string(),
            danger_level: self.record.danger_level.clone(),
            record_index: self.record_index,
        };
        self.chunk_index += 1;
        chunk
    }

    /// Pack as many items as fit under the header without splitting one.
    ///
    /// Always consumes at least one item, so an item that alone exceeds the
    /// budget becomes its own oversized chunk.
    fn pack(&self, header: &str, items: &[String]) -> (String, usize) {
        let mut text = header.to_string();
        let mut tokens = count_tokens(header);
        let mut consumed = 0;

        for item in items {
            let line = format!("- {item}");
            let line_tokens = count_tokens(&line);
            if consumed > 0 && tokens + line_tokens > self.max_tokens {
                break;
            }
            text.push('\n');
            text.push_str(&line);
            tokens += line_tokens;
            consumed += 1;
        }

        (text, consumed)
    }
}

impl Iterator for RecordChunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        loop {
            let category = *ChunkCategory::ALL.get(self.section)?;

            if category == ChunkCategory::MainInfo {
                self.section += 1;
                let text = main_info_text(self.record);
                return Some(self.emit(category, text));
            }

            let items = self.record.items(category);
            if self.item_cursor >= items.len() {
                self.section += 1;
                self.item_cursor = 0;
                continue;
            }

            let header = section_header(category, self.record.primary_name());
            let (text, consumed) = self.pack(&header, &items[self.item_cursor..]);
            self.item_cursor += consumed;
            return Some(self.emit(category, text));
        }
    }
}

/// Primary name, joined names and danger label, one per line.
fn main_info_text(record: &KnowledgeRecord) -> String {
    format!(
        "Bệnh: {}\nTên gọi: {}\nĐộ nguy hiểm: {}",
        record.primary_name(),
        record.all_names(),
        record.danger_level
    )
}

fn section_header(category: ChunkCategory, name: &str) -> String {
    match category {
        ChunkCategory::MainInfo => format!("Bệnh: {name}"),
        ChunkCategory::Symptoms => format!("Triệu chứng của {name}:"),
        ChunkCategory::Treatment => format!("Điều trị và chăm sóc {name}:"),
        ChunkCategory::Precautions => format!("Những điều không nên làm khi mắc {name}:"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn melanoma() -> KnowledgeRecord {
        KnowledgeRecord::new(vec!["Melanoma".into(), "Ung thư hắc tố".into()], "Cao")
            .with_symptoms(vec!["Nốt ruồi thay đổi màu sắc".into(), "Bờ không đều".into()])
            .with_precautions(vec!["Không tự ý nặn".into()])
    }

    #[test]
    fn main_info_lists_name_names_and_danger_in_order() {
        let chunker = RecordChunker::new(500);
        let record = melanoma();
        let first = chunker.chunks(0, &record).unwrap().next().unwrap();

        assert_eq!(first.category, ChunkCategory::MainInfo);
        let lines: Vec<&str> = first.text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("Melanoma"));
        assert!(lines[1].contains("Melanoma, Ung thư hắc tố"));
        assert!(lines[2].contains("Cao"));
    }

    #[test]
    fn empty_groups_are_skipped_in_fixed_order() {
        let chunker = RecordChunker::new(500);
        let record = melanoma();
        let chunks: Vec<Chunk> = chunker.chunks(4, &record).unwrap().collect();

        let categories: Vec<ChunkCategory> = chunks.iter().map(|c| c.category).collect();
        assert_eq!(
            categories,
            vec![ChunkCategory::MainInfo, ChunkCategory::Symptoms, ChunkCategory::Precautions]
        );
        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["4_0", "4_1", "4_2"]);
        assert!(chunks.iter().all(|c| c.entity_name == "Melanoma" && c.danger_level == "Cao"));
    }

    #[test]
    fn list_chunk_has_header_then_hyphen_items() {
        let chunker = RecordChunker::new(500);
        let record = melanoma();
        let symptoms = chunker.chunks(0, &record).unwrap().nth(1).unwrap();

        assert_eq!(
            symptoms.text,
            "Triệu chứng của Melanoma:\n- Nốt ruồi thay đổi màu sắc\n- Bờ không đều"
        );
    }

    #[test]
    fn oversized_group_splits_at_item_boundaries() {
        let items: Vec<String> = (0..6).map(|i| format!("dấu hiệu số {i}")).collect();
        let record =
            KnowledgeRecord::new(vec!["Nevus".into()], "Thấp").with_symptoms(items.clone());
        // header = 4 words, each item = 4 words
        let chunker = RecordChunker::new(12);
        let symptoms: Vec<Chunk> = chunker
            .chunks(1, &record)
            .unwrap()
            .filter(|c| c.category == ChunkCategory::Symptoms)
            .collect();

        assert!(symptoms.len() > 1);
        for chunk in &symptoms {
            assert!(count_tokens(&chunk.text) <= 12, "chunk over budget: {}", chunk.text);
            assert!(chunk.text.starts_with("Triệu chứng của Nevus:"));
        }
        let rendered: Vec<String> = symptoms
            .iter()
            .flat_map(|c| c.text.lines().skip(1).map(|l| l.trim_start_matches("- ").to_string()))
            .collect();
        assert_eq!(rendered, items);
    }

    #[test]
    fn single_item_over_budget_is_kept_whole() {
        let long_item = "rất ".repeat(40);
        let record = KnowledgeRecord::new(vec!["Nevus".into()], "Thấp")
            .with_symptoms(vec![long_item.clone()]);
        let chunker = RecordChunker::new(10);
        let chunks: Vec<Chunk> = chunker.chunks(0, &record).unwrap().collect();

        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].text.ends_with(long_item.as_str()));
    }

    #[test]
    fn iterator_restarts_from_the_beginning() {
        let chunker = RecordChunker::new(500);
        let record = melanoma();
        let first: Vec<Chunk> = chunker.chunks(0, &record).unwrap().collect();
        let second: Vec<Chunk> = chunker.chunks(0, &record).unwrap().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn record_without_danger_label_is_rejected() {
        let chunker = RecordChunker::new(500);
        let record = KnowledgeRecord::new(vec!["Nevus".into()], "");
        assert!(chunker.chunks(0, &record).is_err());
    }
}
