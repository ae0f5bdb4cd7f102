//! Prompt composition.
//!
//! Retrieved context is placed after the base prompt and followed by
//! branch-specific instructions. The two blocks are never interleaved.

use std::path::PathBuf;

use serde::Serialize;

use crate::record::{QueryRoute, RetrievalResult};

const KNOWLEDGE_LEAD_IN: &str = "Dưới đây là thông tin tham khảo từ cơ sở dữ liệu bệnh da liễu:";

const KNOWLEDGE_INSTRUCTIONS: &str = "\
HƯỚNG DẪN TRẢ LỜI:
- Ưu tiên sử dụng thông tin tham khảo ở trên nếu nó liên quan đến câu hỏi.
- **TRẢ LỜI NGẮN GỌN, SÚC TÍCH - chỉ đưa ra thông tin cần thiết, tránh dài dòng.**
- Nếu thông tin tham khảo không liên quan đến câu hỏi, hãy trả lời dựa trên kiến thức y khoa chung của bạn.
- Luôn khuyến khích người dùng đi khám bác sĩ da liễu khi cần thiết.";

const DIRECTORY_LEAD_IN: &str = "Dưới đây là danh sách cơ sở y tế từ cơ sở dữ liệu:";

const DIRECTORY_INSTRUCTIONS: &str = "\
CHỈ DẪN ĐẶC BIỆT CHO CƠ SỞ Y TẾ:
- Trình bày CHÍNH XÁC thông tin từ danh sách ở trên: tên, địa chỉ, số điện thoại, website và bản đồ.
- KHÔNG thêm, bớt hoặc suy diễn bất kỳ thông tin nào không có trong danh sách.
- Luôn hiển thị đường dẫn bản đồ nếu có.
- Nếu không tìm thấy cơ sở nào, hãy thông báo rõ ràng cho người dùng.";

/// A prompt ready for the generation layer, plus supporting images.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancedPrompt {
    pub prompt: String,
    pub images: Option<Vec<PathBuf>>,
}

/// Wraps retrieved context with instructions for the matching branch.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptComposer;

impl PromptComposer {
    pub fn new() -> Self {
        Self
    }

    /// Compose `base_prompt` with the context in `result`.
    ///
    /// Without context, or for the skip route, the base prompt is returned
    /// unchanged with no images. The directory branch never carries images.
    pub fn compose(&self, base_prompt: &str, result: RetrievalResult) -> EnhancedPrompt {
        let unchanged = || EnhancedPrompt { prompt: base_prompt.to_string(), images: None };
        let Some(context) = result.context else {
            return unchanged();
        };

        let (lead_in, instructions, images) = match result.route {
            Some(QueryRoute::Directory) => (DIRECTORY_LEAD_IN, DIRECTORY_INSTRUCTIONS, None),
            Some(QueryRoute::Knowledge) => {
                (KNOWLEDGE_LEAD_IN, KNOWLEDGE_INSTRUCTIONS, result.images)
            }
            Some(QueryRoute::Skip) | None => return unchanged(),
        };

        EnhancedPrompt {
            prompt: format!("{base_prompt}\n\n{lead_in}\n\n{context}\n\n{instructions}"),
            images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "Bạn là trợ lý da liễu.";

    #[test]
    fn knowledge_context_sits_between_base_and_instructions() {
        let result = RetrievalResult {
            route: Some(QueryRoute::Knowledge),
            context: Some("Bệnh: Melanoma".into()),
            images: Some(vec![PathBuf::from("m1.png")]),
        };
        let enhanced = PromptComposer::new().compose(BASE, result);

        let base_at = enhanced.prompt.find(BASE).unwrap();
        let context_at = enhanced.prompt.find("Bệnh: Melanoma").unwrap();
        let instructions_at = enhanced.prompt.find("TRẢ LỜI NGẮN GỌN").unwrap();
        assert!(base_at < context_at && context_at < instructions_at);
        assert!(enhanced.prompt.contains("kiến thức y khoa chung"));
        assert_eq!(enhanced.images, Some(vec![PathBuf::from("m1.png")]));
    }

    #[test]
    fn directory_context_demands_fidelity_and_drops_images() {
        let result = RetrievalResult {
            route: Some(QueryRoute::Directory),
            context: Some("1. Phòng khám A".into()),
            images: Some(vec![PathBuf::from("stray.png")]),
        };
        let enhanced = PromptComposer::new().compose(BASE, result);

        assert!(enhanced.prompt.contains("CHỈ DẪN ĐẶC BIỆT CHO CƠ SỞ Y TẾ"));
        assert!(enhanced.prompt.contains("KHÔNG thêm, bớt"));
        assert!(!enhanced.prompt.contains("TRẢ LỜI NGẮN GỌN"));
        assert_eq!(enhanced.images, None);
    }

    #[test]
    fn missing_context_returns_base_prompt() {
        let composer = PromptComposer::new();
        let none = RetrievalResult { route: Some(QueryRoute::Knowledge), ..Default::default() };
        assert_eq!(composer.compose(BASE, none).prompt, BASE);

        let skipped = RetrievalResult {
            route: Some(QueryRoute::Skip),
            context: Some("ignored".into()),
            images: None,
        };
        let enhanced = composer.compose(BASE, skipped);
        assert_eq!(enhanced, EnhancedPrompt { prompt: BASE.to_string(), images: None });
    }
}
