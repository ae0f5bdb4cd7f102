//! Keyword routing of user queries.
//!
//! A query is a directory query if it mentions a facility, a doctor or a
//! location, and a knowledge query if it mentions a disease, a symptom or a
//! treatment. Matching is case-insensitive substring search over
//! two fixed keyword lists; the two tests are independent, and
//! [`QueryClassifier::route`] gives the directory branch priority.

use tracing::debug;

use crate::record::QueryRoute;

/// Facility, doctor and location keywords.
const DIRECTORY_KEYWORDS: &[&str] = &[
    "bệnh viện",
    "phòng khám",
    "cơ sở",
    "trung tâm y tế",
    "trạm y tế",
    "địa chỉ",
    "ở đâu",
    "chỗ nào",
    "số điện thoại",
    "khám",
    "bác sĩ",
    "quận",
    "huyện",
    "phường",
    "thị xã",
    "thành phố",
    "hà nội",
    "gần",
    "hospital",
    "clinic",
    "medical center",
    "address",
    "location",
    "where",
    "near",
    "district",
    "ward",
    "phone number",
    "directions",
];

/// Disease, symptom and treatment keywords.
///
/// Must not contain "da" or "liễu": facility searches ("cơ sở da liễu") use
/// them too.
const KNOWLEDGE_KEYWORDS: &[&str] = &[
    "bệnh",
    "triệu chứng",
    "điều trị",
    "chữa",
    "thuốc",
    "đau",
    "ngứa",
    "viêm",
    "nhiễm",
    "tổn thương",
    "loét",
    "mụn",
    "phát ban",
    "sưng",
    "vảy",
    "chẩn đoán",
    "phòng ngừa",
    "nguy hiểm",
    "đỏ",
    "ban",
    "disease",
    "symptom",
    "treatment",
    "medicine",
    "skin",
    "doctor",
    "carcinoma",
    "keratosis",
    "melanoma",
    "psoriasis",
    "dermatitis",
    "lesion",
    "infection",
    "inflammation",
    "rash",
];

/// Routes queries to the directory branch, the knowledge branch, or neither.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    /// Create a classifier over the built-in keyword lists.
    pub fn new() -> Self {
        Self
    }

    /// Whether the query asks about a facility or a location.
    pub fn is_directory_query(&self, query: &str) -> bool {
        matches_any(query, DIRECTORY_KEYWORDS)
    }

    /// Whether the query asks about a disease, symptom or treatment.
    pub fn is_knowledge_query(&self, query: &str) -> bool {
        matches_any(query, KNOWLEDGE_KEYWORDS)
    }

    /// Pick the retrieval branch. Directory wins when both match.
    pub fn route(&self, query: &str) -> QueryRoute {
        let route = if self.is_directory_query(query) {
            QueryRoute::Directory
        } else if self.is_knowledge_query(query) {
            QueryRoute::Knowledge
        } else {
            QueryRoute::Skip
        };
        debug!(?route, "classified query");
        route
    }
}

fn matches_any(query: &str, keywords: &[&str]) -> bool {
    let query = query.trim().to_lowercase();
    !query.is_empty() && keywords.iter().any(|keyword| query.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facility_search_is_directory_only() {
        let classifier = QueryClassifier::new();
        let query = "Tìm cơ sở da liễu ở quận Long Biên";
        assert!(classifier.is_directory_query(query));
        assert!(!classifier.is_knowledge_query(query));
        assert_eq!(classifier.route(query), QueryRoute::Directory);
    }

    #[test]
    fn disease_question_is_knowledge_only() {
        let classifier = QueryClassifier::new();
        let query = "Melanoma có nguy hiểm không?";
        assert!(!classifier.is_directory_query(query));
        assert!(classifier.is_knowledge_query(query));
        assert_eq!(classifier.route(query), QueryRoute::Knowledge);
    }

    #[test]
    fn greeting_is_skipped() {
        let classifier = QueryClassifier::new();
        assert!(!classifier.is_directory_query("xin chào"));
        assert!(!classifier.is_knowledge_query("xin chào"));
        assert_eq!(classifier.route("xin chào"), QueryRoute::Skip);
    }

    #[test]
    fn empty_query_matches_nothing() {
        let classifier = QueryClassifier::new();
        assert!(!classifier.is_directory_query(""));
        assert!(!classifier.is_knowledge_query("   "));
        assert_eq!(classifier.route(""), QueryRoute::Skip);
    }

    #[test]
    fn directory_wins_when_both_match() {
        let classifier = QueryClassifier::new();
        let query = "Bệnh viện nào chữa vảy nến tốt ở Cầu Giấy?";
        assert!(classifier.is_directory_query(query));
        assert!(classifier.is_knowledge_query(query));
        assert_eq!(classifier.route(query), QueryRoute::Directory);
    }

    #[test]
    fn doctor_search_with_district_is_directory() {
        let classifier = QueryClassifier::new();
        assert_eq!(classifier.route("Tìm bác sĩ ở Tây Hồ"), QueryRoute::Directory);
        assert_eq!(classifier.route("Nên đi khám ở đâu tại Hoàng Mai?"), QueryRoute::Directory);
    }

    #[test]
    fn plain_skin_complaints_are_knowledge() {
        let classifier = QueryClassifier::new();
        for query in ["Da tôi bị đỏ và nổi ban", "Which doctor treats skin problems?"] {
            assert!(!classifier.is_directory_query(query), "{query}");
            assert_eq!(classifier.route(query), QueryRoute::Knowledge, "{query}");
        }
    }

    #[test]
    fn matching_ignores_case() {
        let classifier = QueryClassifier::new();
        assert!(classifier.is_knowledge_query("TRIỆU CHỨNG của chàm"));
        assert!(classifier.is_directory_query("PHÒNG KHÁM gần tôi"));
    }
}
