//! 图片文字提取服务

use crate::error::{AppError, AppResult, ExternalServiceError};
use crate::services::llm_service::{ChatModel, ChatRequest};
use futures::future::{self, BoxFuture};
use std::sync::Arc;
use tracing::debug;

const OCR_PROMPT: &str = "Extract all text from this image. Return only the text content, nothing else.";
const OCR_MAX_TOKENS: u32 = 1000;

/// 模拟实现返回的固定文本
pub const MOCK_EXTRACTED_TEXT: &str = "This is a mock extracted text from the image.";

/// 图片文字提取
pub trait OcrService: Send + Sync {
    /// `image_data` 为 data URI（`data:{mime};base64,...`）
    fn extract_text<'a>(&'a self, image_data: &'a str) -> BoxFuture<'a, AppResult<String>>;
}

/// 基于视觉模型的文字提取
pub struct LlmOcrService {
    model: Arc<dyn ChatModel>,
}

impl LlmOcrService {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    async fn extract(&self, image_data: &str) -> AppResult<String> {
        let images = [image_data.to_string()];
        let request = ChatRequest::new(OCR_PROMPT)
            .images(&images)
            .max_tokens(OCR_MAX_TOKENS);

        match self.model.complete(request).await {
            Ok(text) => {
                debug!("提取到 {} 个字符", text.chars().count());
                Ok(text)
            }
            // 图片里没有文字时模型可能返回空内容
            Err(AppError::External(ExternalServiceError::EmptyCompletion { .. })) => {
                debug!("图片未提取到文字");
                Ok(String::new())
            }
            Err(e) => Err(e),
        }
    }
}

impl OcrService for LlmOcrService {
    fn extract_text<'a>(&'a self, image_data: &'a str) -> BoxFuture<'a, AppResult<String>> {
        Box::pin(self.extract(image_data))
    }
}

/// 离线模拟实现
#[derive(Debug, Default, Clone, Copy)]
pub struct MockOcrService;

impl OcrService for MockOcrService {
    fn extract_text<'a>(&'a self, _image_data: &'a str) -> BoxFuture<'a, AppResult<String>> {
        Box::pin(future::ready(Ok(MOCK_EXTRACTED_TEXT.to_string())))
    }
}
