//! 内容标题生成服务
//!
//! 根据前几张卡片的内容给整组卡片起一个简短的标题（5-10 个词）

use crate::error::{AppResult, ExternalServiceError};
use crate::models::GeneratedCard;
use crate::services::llm_service::{ChatModel, ChatRequest};
use futures::future::{self, BoxFuture};
use regex::Regex;
use std::sync::Arc;
use tracing::debug;

/// 取样的卡片数量
const SAMPLE_SIZE: usize = 5;
const TITLE_TEMPERATURE: f32 = 0.5;
const TITLE_MAX_TOKENS: u32 = 30;

/// 模拟实现无法识别主题时的标题
pub const FALLBACK_TITLE: &str = "Study Material";

const SYSTEM_PROMPT: &str = "You are a helpful assistant that creates concise, descriptive titles for study materials.
Given a sample of flashcards, analyze their content and create a short, descriptive title (5-10 words max).

The title should:
- Capture the main topic/theme
- Be clear and concise
- Be useful for organizing study materials
- Avoid generic terms like \"Study Set\" or \"Flashcards\"

Examples of good titles:
- French Verb Conjugations - Past Tense
- Chapter 5 Vocabulary
- Basic Math Formulas
- Spanish Travel Phrases
- Biology Cell Structure";

/// 内容标题生成
pub trait ContentTitleGenerator: Send + Sync {
    fn generate_title<'a>(&'a self, cards: &'a [GeneratedCard]) -> BoxFuture<'a, AppResult<String>>;
}

/// 基于 LLM 的标题生成
pub struct LlmTitleGenerator {
    model: Arc<dyn ChatModel>,
}

impl LlmTitleGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    async fn generate(&self, cards: &[GeneratedCard]) -> AppResult<String> {
        let user = format!(
            "Create a title for flashcards covering this content:\n\n{}",
            sample_cards(cards)
        );
        let request = ChatRequest::new(&user)
            .system(SYSTEM_PROMPT)
            .temperature(TITLE_TEMPERATURE)
            .max_tokens(TITLE_MAX_TOKENS);

        let reply = self.model.complete(request).await?;
        let title = clean_title(&reply);

        if title.is_empty() {
            return Err(ExternalServiceError::EmptyCompletion {
                model: self.model.model_name().to_string(),
            }
            .into());
        }

        debug!("生成内容标题: {}", title);
        Ok(title)
    }
}

impl ContentTitleGenerator for LlmTitleGenerator {
    fn generate_title<'a>(&'a self, cards: &'a [GeneratedCard]) -> BoxFuture<'a, AppResult<String>> {
        Box::pin(self.generate(cards))
    }
}

/// 前几张卡片拼成 `Q: ...\nA: ...`，卡片间空一行
fn sample_cards(cards: &[GeneratedCard]) -> String {
    cards
        .iter()
        .take(SAMPLE_SIZE)
        .map(|card| format!("Q: {}\nA: {}", card.front, card.back))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 去掉引号和首尾空白
fn clean_title(reply: &str) -> String {
    reply.replace(['\'', '"'], "").trim().to_string()
}

/// 离线模拟实现：从第一张卡片的问题里提取主题
#[derive(Debug, Default, Clone, Copy)]
pub struct MockTitleGenerator;

impl MockTitleGenerator {
    fn topic_of(front: &str) -> Option<String> {
        let re = Regex::new(r"(?:What (?:is|are)|Translate|Define)\s+(.+?)(?:\?|$)").ok()?;
        re.captures(front)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

impl ContentTitleGenerator for MockTitleGenerator {
    fn generate_title<'a>(&'a self, cards: &'a [GeneratedCard]) -> BoxFuture<'a, AppResult<String>> {
        let title = cards
            .first()
            .and_then(|card| Self::topic_of(&card.front))
            .unwrap_or_else(|| FALLBACK_TITLE.to_string());
        Box::pin(future::ready(Ok(title)))
    }
}
