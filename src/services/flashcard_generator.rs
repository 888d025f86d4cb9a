//! 卡片生成服务
//!
//! 模型按约定输出 `FRONT:` / `BACK:` 行，卡片之间用空行分隔：
//!
//! ```text
//! FRONT: What does "hola" mean?
//! BACK: Hello
//!
//! FRONT: Translate "gracias"
//! BACK: Thank you
//! ```

use crate::error::{AppResult, ExternalServiceError};
use crate::models::GeneratedCard;
use crate::services::llm_service::{ChatModel, ChatRequest};
use crate::utils::logging::truncate_text;
use futures::future::{self, BoxFuture};
use std::sync::Arc;
use tracing::{debug, warn};

const FRONT_PREFIX: &str = "FRONT:";
const BACK_PREFIX: &str = "BACK:";

const GENERATION_TEMPERATURE: f32 = 0.7;
const GENERATION_MAX_TOKENS: u32 = 2048;

const SYSTEM_PROMPT: &str = "You are a helpful study assistant that creates flashcards from text content.
Create flashcards in the following format:
FRONT: [Question or key concept]
BACK: [Answer or explanation]

Rules:
- Make cards focused and specific
- Avoid overly long answers
- Create clear, testable questions
- Format each card as shown above
- Create 5-10 cards per input";

/// 卡片生成
pub trait FlashcardGenerator: Send + Sync {
    /// 根据提取的文本生成问答对，`prompt` 为用户的额外要求
    fn generate<'a>(
        &'a self,
        extracted_text: &'a str,
        prompt: Option<&'a str>,
    ) -> BoxFuture<'a, AppResult<Vec<GeneratedCard>>>;
}

/// 基于 LLM 的卡片生成
pub struct LlmFlashcardGenerator {
    model: Arc<dyn ChatModel>,
}

impl LlmFlashcardGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    async fn generate_cards(&self, extracted_text: &str, prompt: Option<&str>) -> AppResult<Vec<GeneratedCard>> {
        let system = build_system_prompt(prompt);
        let user = format!("Create flashcards from this text:\n\n{}", extracted_text);

        let request = ChatRequest::new(&user)
            .system(&system)
            .temperature(GENERATION_TEMPERATURE)
            .max_tokens(GENERATION_MAX_TOKENS);

        let content = self.model.complete(request).await?;
        if content.trim().is_empty() {
            return Err(ExternalServiceError::EmptyCompletion {
                model: self.model.model_name().to_string(),
            }
            .into());
        }

        let cards = parse_flashcards(&content);

        if cards.is_empty() {
            warn!("⚠️ 模型回复中没有解析出卡片: {}", truncate_text(&content, 200));
        } else {
            debug!("解析出 {} 张卡片", cards.len());
        }

        Ok(cards)
    }
}

impl FlashcardGenerator for LlmFlashcardGenerator {
    fn generate<'a>(
        &'a self,
        extracted_text: &'a str,
        prompt: Option<&'a str>,
    ) -> BoxFuture<'a, AppResult<Vec<GeneratedCard>>> {
        Box::pin(self.generate_cards(extracted_text, prompt))
    }
}

fn build_system_prompt(prompt: Option<&str>) -> String {
    match prompt {
        Some(extra) => format!("{}\nAdditional instructions: {}", SYSTEM_PROMPT, extra),
        None => SYSTEM_PROMPT.to_string(),
    }
}

/// 解析模型回复
///
/// 按空行切块；同时含有 `FRONT:` 和 `BACK:` 的块才会被考虑，
/// 两边去掉空白后都非空才生成卡片。其余块直接丢弃。
pub fn parse_flashcards(content: &str) -> Vec<GeneratedCard> {
    content
        .split("\n\n")
        .filter(|block| block.contains(FRONT_PREFIX) && block.contains(BACK_PREFIX))
        .filter_map(parse_block)
        .collect()
}

fn parse_block(block: &str) -> Option<GeneratedCard> {
    let mut front = "";
    let mut back = "";

    for line in block.lines() {
        if let Some(rest) = line.strip_prefix(FRONT_PREFIX) {
            front = rest.trim();
        } else if let Some(rest) = line.strip_prefix(BACK_PREFIX) {
            back = rest.trim();
        }
    }

    (!front.is_empty() && !back.is_empty()).then(|| GeneratedCard::new(front, back))
}

/// 离线模拟实现，固定返回两张卡片
#[derive(Debug, Default, Clone, Copy)]
pub struct MockFlashcardGenerator;

impl FlashcardGenerator for MockFlashcardGenerator {
    fn generate<'a>(
        &'a self,
        extracted_text: &'a str,
        _prompt: Option<&'a str>,
    ) -> BoxFuture<'a, AppResult<Vec<GeneratedCard>>> {
        let excerpt: String = extracted_text.chars().take(100).collect();
        let cards = vec![
            GeneratedCard::new("What is the main concept in this text?", format!("{}...", excerpt)),
            GeneratedCard::new("Key idea?", "This is a mock flashcard based on the extracted text."),
        ];
        Box::pin(future::ready(Ok(cards)))
    }
}
