//! Rule-based facility lookup by region.

use tracing::{debug, info};

use crate::corpus::DirectoryDataset;
use crate::error::Result;
use crate::record::DirectoryEntry;

/// Known regions, in priority order. The first one found in a query wins.
pub const REGIONS: &[&str] = &[
    "Ba Đình",
    "Hoàn Kiếm",
    "Tây Hồ",
    "Long Biên",
    "Cầu Giấy",
    "Đống Đa",
    "Hai Bà Trưng",
    "Hoàng Mai",
    "Thanh Xuân",
    "Nam Từ Liêm",
    "Bắc Từ Liêm",
    "Hà Đông",
    "Sơn Tây",
    "Ba Vì",
    "Chương Mỹ",
    "Đan Phượng",
    "Đông Anh",
    "Gia Lâm",
    "Hoài Đức",
    "Mê Linh",
    "Mỹ Đức",
    "Phú Xuyên",
    "Phúc Thọ",
    "Quốc Oai",
    "Sóc Sơn",
    "Thạch Thất",
    "Thanh Oai",
    "Thanh Trì",
    "Thường Tín",
    "Ứng Hòa",
];

/// Administrative-unit words that may precede a region name.
const UNIT_WORDS: &[&str] = &["quận", "huyện", "thị xã"];

/// Nearby areas shown per facility.
const MAX_NEARBY_AREAS: usize = 3;

/// Extracts a region from a query and looks up facilities in it.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    dataset: DirectoryDataset,
}

impl DirectoryResolver {
    /// Create a resolver over `dataset`.
    pub fn new(dataset: DirectoryDataset) -> Self {
        Self { dataset }
    }

    /// The first known region mentioned in `query`, bare or after a unit word.
    ///
    /// Matching ignores case; the canonical spelling from [`REGIONS`] is
    /// returned.
    pub fn extract_region(&self, query: &str) -> Option<&'static str> {
        let query = query.to_lowercase();
        REGIONS.iter().copied().find(|region| {
            let region = region.to_lowercase();
            query.contains(&region)
                || UNIT_WORDS.iter().any(|unit| query.contains(&format!("{unit} {region}")))
        })
    }

    /// Entries whose district label contains `region` or is contained in it,
    /// ignoring case, in dataset order.
    pub fn lookup<'a>(
        &self,
        entries: &'a [DirectoryEntry],
        region: &str,
    ) -> Vec<&'a DirectoryEntry> {
        let region = region.trim().to_lowercase();
        if region.is_empty() {
            return Vec::new();
        }
        entries
            .iter()
            .filter(|entry| {
                let district = entry.district.trim().to_lowercase();
                !district.is_empty() && (district.contains(&region) || region.contains(&district))
            })
            .collect()
    }

    /// Render matches as a numbered list, or a fixed sentence if there are none.
    pub fn format(&self, entries: &[&DirectoryEntry], region: &str) -> String {
        if entries.is_empty() {
            return format!(
                "Không tìm thấy cơ sở y tế da liễu nào tại {region} trong cơ sở dữ liệu."
            );
        }

        let mut out = format!("Các cơ sở y tế da liễu tại {region}:\n");
        for (position, entry) in entries.iter().enumerate() {
            out.push_str(&format!("\n{}. {}\n", position + 1, entry.name));
            out.push_str(&format!("   - Địa chỉ: {}", entry.address));
            if let Some(phone) = entry.phone() {
                out.push_str(&format!("\n   - Điện thoại: {phone}"));
            }
            if let Some(website) = entry.website() {
                out.push_str(&format!("\n   - Website: {website}"));
            }
            if let Some(map) = entry.map_location() {
                out.push_str(&format!("\n   - Bản đồ: {map}"));
            }
            let nearby: Vec<&str> = entry
                .nearby_areas
                .iter()
                .map(|area| area.trim())
                .filter(|area| !area.is_empty())
                .take(MAX_NEARBY_AREAS)
                .collect();
            if !nearby.is_empty() {
                out.push_str(&format!("\n   - Khu vực lân cận: {}", nearby.join(", ")));
            }
            out.push('\n');
        }
        out
    }

    /// Extract, look up and format in one step.
    ///
    /// Returns `None` when the query names no known region.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::CorpusError`](crate::RagError::CorpusError) if the
    /// dataset cannot be read.
    pub async fn resolve(&self, query: &str) -> Result<Option<String>> {
        let Some(region) = self.extract_region(query) else {
            debug!("directory query names no known region");
            return Ok(None);
        };

        let entries = self.dataset.load().await?;
        let matches = self.lookup(&entries, region);
        info!(region, matches = matches.len(), "resolved directory query");
        Ok(Some(self.format(&matches, region)))
    }
}
