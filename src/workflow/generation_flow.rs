//! 卡片生成流程 - 流程层
//!
//! 核心职责：定义"一次上传"的完整处理流程
//!
//! 流程顺序：
//! 1. 逐张图片提取文字（按顺序，不并发）
//! 2. 拼接文字 → 生成卡片
//! 3. 内容标题（失败时忽略）
//! 4. 分组名、序号 → 上传标题
//! 5. 保存上传记录 → 保存卡片
//!
//! 除内容标题外，任何一步失败都会终止整个流程。

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::models::{Flashcard, GeneratedCard, NewFlashcard, NewUpload};
use crate::services::{upload_namer, AiServices, StudyRepository};
use crate::utils::logging::truncate_text;
use crate::workflow::process_request::ProcessRequest;

/// 多张图片的文字之间的分隔符
pub const TEXT_SEPARATOR: &str = "\n\n---\n\n";

/// 流程结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOutcome {
    /// 卡片上记录的上传引用
    pub upload_id: String,
    /// 上传记录在存储中的 id
    pub upload_record_id: String,
    pub title: String,
    pub flashcards: Vec<Flashcard>,
}

/// 卡片生成流程
///
/// - 编排 OCR → 生成 → 命名 → 保存
/// - 不持有 HTTP 客户端，只依赖业务能力（services）
#[derive(Clone)]
pub struct GenerationFlow {
    ai: AiServices,
    repository: StudyRepository,
    generate_content_titles: bool,
    max_images: usize,
}

impl GenerationFlow {
    pub fn new(ai: AiServices, repository: StudyRepository, config: &Config) -> Self {
        Self {
            ai,
            repository,
            generate_content_titles: config.generate_content_titles,
            max_images: config.max_images,
        }
    }

    pub async fn run(&self, request: &ProcessRequest) -> AppResult<ProcessOutcome> {
        request.validate(self.max_images)?;
        info!("{} 📸 开始处理上传", request);

        // ========== 1. 提取文字 ==========
        let combined_text = self.extract_texts(request).await?;

        // ========== 2. 生成卡片 ==========
        let cards = self
            .ai
            .generator
            .generate(&combined_text, request.prompt.as_deref())
            .await?;
        info!("{} 🃏 生成了 {} 张卡片", request, cards.len());

        // ========== 3. 内容标题 ==========
        let content_description = match &request.content_description {
            Some(description) => Some(description.clone()),
            None => self.content_title(request, &cards).await,
        };

        // ========== 4. 命名 ==========
        let group = match &request.group {
            Some(group) => group.clone(),
            None => upload_namer::generate_group_name(&cards, request.prompt.as_deref()),
        };

        let incremental = match request.course.as_deref() {
            Some(course) => Some(upload_namer::upload_count_in_group(&self.repository, course, &group).await?),
            None => None,
        };

        let title = upload_namer::generate_upload_title(
            cards.len(),
            request.course.as_deref(),
            Some(&group),
            content_description.as_deref(),
            incremental,
        );
        info!("{} 🏷️ 标题: {} (分组: {})", request, title, group);

        // ========== 5. 保存 ==========
        let upload = self
            .repository
            .create_upload(NewUpload {
                date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                summary: title.clone(),
                book_page: None,
                course: request.course.clone(),
                image_count: request.images.len() as u32,
                focus_prompt: request.prompt.clone(),
            })
            .await?;
        let upload_ref = upload.reference.clone().unwrap_or_else(|| upload.id.clone());

        let new_cards = cards
            .into_iter()
            .map(|card| NewFlashcard {
                front: card.front,
                back: card.back,
                course: request.course.clone(),
                group: Some(group.clone()),
                upload_id: Some(upload_ref.clone()),
            })
            .collect();
        let flashcards = self.repository.create_flashcards(new_cards).await?;

        info!("{} ✅ 处理完成: {} 张卡片, 上传引用 {}", request, flashcards.len(), upload_ref);

        Ok(ProcessOutcome {
            upload_id: upload_ref,
            upload_record_id: upload.id,
            title,
            flashcards,
        })
    }

    /// 按顺序逐张提取，任何一张失败都终止
    async fn extract_texts(&self, request: &ProcessRequest) -> AppResult<String> {
        let total = request.images.len();
        let mut texts = Vec::with_capacity(total);

        for (index, image) in request.images.iter().enumerate() {
            info!("{} 🔍 正在识别第 {}/{} 张图片", request, index + 1, total);
            let text = self.ai.ocr.extract_text(&image.to_data_uri()).await?;
            debug!("第 {} 张图片文字: {}", index + 1, truncate_text(&text, 80));
            texts.push(text);
        }

        Ok(texts.join(TEXT_SEPARATOR))
    }

    /// 生成内容标题；失败时记录警告并返回 `None`
    async fn content_title(&self, request: &ProcessRequest, cards: &[GeneratedCard]) -> Option<String> {
        if !self.generate_content_titles || cards.is_empty() {
            return None;
        }

        match self.ai.title_generator.generate_title(cards).await {
            Ok(title) => Some(title),
            Err(e) => {
                warn!("{} ⚠️ 内容标题生成失败，改用默认标题: {}", request, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, ExternalServiceError};
    use crate::infrastructure::{InMemoryStore, RecordStore};
    use crate::models::ListQuery;
    use crate::services::{ContentTitleGenerator, FlashcardGenerator, OcrService};
    use crate::workflow::process_request::ImageInput;
    use futures::future::{self, BoxFuture};
    use std::sync::{Arc, Mutex};

    /// 按顺序返回预设文字，记录收到的图片
    struct ScriptedOcr {
        texts: Mutex<Vec<AppResult<String>>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedOcr {
        fn new(texts: Vec<AppResult<String>>) -> Self {
            Self {
                texts: Mutex::new(texts.into_iter().rev().collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl OcrService for ScriptedOcr {
        fn extract_text<'a>(&'a self, image_data: &'a str) -> BoxFuture<'a, AppResult<String>> {
            self.seen.lock().unwrap().push(image_data.to_string());
            let next = self.texts.lock().unwrap().pop().unwrap_or_else(|| Ok(String::new()));
            Box::pin(future::ready(next))
        }
    }

    /// 记录收到的文本，返回固定卡片
    struct RecordingGenerator {
        cards: Vec<GeneratedCard>,
        seen: Mutex<Option<(String, Option<String>)>>,
    }

    impl FlashcardGenerator for RecordingGenerator {
        fn generate<'a>(
            &'a self,
            extracted_text: &'a str,
            prompt: Option<&'a str>,
        ) -> BoxFuture<'a, AppResult<Vec<GeneratedCard>>> {
            *self.seen.lock().unwrap() = Some((extracted_text.to_string(), prompt.map(str::to_string)));
            Box::pin(future::ready(Ok(self.cards.clone())))
        }
    }

    struct FailingTitle;

    impl ContentTitleGenerator for FailingTitle {
        fn generate_title<'a>(&'a self, _cards: &'a [GeneratedCard]) -> BoxFuture<'a, AppResult<String>> {
            Box::pin(future::ready(Err(ExternalServiceError::EmptyCompletion {
                model: "test".into(),
            }
            .into())))
        }
    }

    struct FixedTitle(&'static str);

    impl ContentTitleGenerator for FixedTitle {
        fn generate_title<'a>(&'a self, _cards: &'a [GeneratedCard]) -> BoxFuture<'a, AppResult<String>> {
            Box::pin(future::ready(Ok(self.0.to_string())))
        }
    }

    struct Fixture {
        store: Arc<InMemoryStore>,
        ocr: Arc<ScriptedOcr>,
        generator: Arc<RecordingGenerator>,
        flow: GenerationFlow,
    }

    fn fixture(ocr_texts: Vec<AppResult<String>>, title: Arc<dyn ContentTitleGenerator>) -> Fixture {
        let config = Config::default();
        let store = Arc::new(InMemoryStore::new());
        let repository = StudyRepository::new(store.clone(), &config).unwrap();
        let ocr = Arc::new(ScriptedOcr::new(ocr_texts));
        let generator = Arc::new(RecordingGenerator {
            cards: vec![
                GeneratedCard::new("Capital of Peru?", "Lima"),
                GeneratedCard::new("Largest ocean?", "Pacific"),
            ],
            seen: Mutex::new(None),
        });
        let ai = AiServices {
            ocr: ocr.clone(),
            generator: generator.clone(),
            title_generator: title,
        };
        Fixture {
            store,
            ocr,
            generator,
            flow: GenerationFlow::new(ai, repository, &config),
        }
    }

    fn images(n: usize) -> Vec<ImageInput> {
        (0..n).map(|i| ImageInput::new("image/png", vec![i as u8])).collect()
    }

    #[tokio::test]
    async fn test_run_joins_texts_and_tags_cards() {
        let fx = fixture(
            vec![Ok("page one".into()), Ok("page two".into())],
            Arc::new(FixedTitle("Geography Basics")),
        );
        let request = ProcessRequest::new(images(2))
            .with_course(Some("World".into()))
            .with_group(Some("Capitals".into()))
            .with_prompt(Some("Focus on capitals".into()));

        let outcome = fx.flow.run(&request).await.unwrap();

        // 图片按顺序识别
        let seen = fx.ocr.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![images(2)[0].to_data_uri(), images(2)[1].to_data_uri()]);

        let (text, prompt) = fx.generator.seen.lock().unwrap().clone().unwrap();
        assert_eq!(text, "page one\n\n---\n\npage two");
        assert_eq!(prompt.as_deref(), Some("Focus on capitals"));

        assert_eq!(outcome.title, "Geography Basics - 2 cards");
        assert_eq!(outcome.flashcards.len(), 2);
        for card in &outcome.flashcards {
            assert_eq!(card.upload_id.as_deref(), Some(outcome.upload_id.as_str()));
            assert_eq!(card.course.as_deref(), Some("World"));
            assert_eq!(card.group.as_deref(), Some("Capitals"));
        }

        let uploads = fx.store.list("Uploads", &ListQuery::all()).await.unwrap();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].id, outcome.upload_record_id);
        assert_eq!(uploads[0].fields["imageCount"], serde_json::json!(2));
        assert_eq!(uploads[0].fields["focusPrompt"], serde_json::json!("Focus on capitals"));
    }

    #[tokio::test]
    async fn test_title_failure_falls_back_to_numbered_title() {
        let fx = fixture(vec![Ok("text".into())], Arc::new(FailingTitle));
        let request = ProcessRequest::new(images(1)).with_course(Some("Spanish".into()));

        let outcome = fx.flow.run(&request).await.unwrap();

        // 没有分组时根据卡片推断，序号为 1，标题退回到课程
        assert_eq!(outcome.title, "Spanish #1  - 2 cards");
        let group = outcome.flashcards[0].group.clone().unwrap();
        assert!(group.starts_with("Study Set - "));
    }

    #[tokio::test]
    async fn test_content_description_skips_title_generation() {
        let fx = fixture(vec![Ok("text".into())], Arc::new(FailingTitle));
        let request = ProcessRequest::new(images(1)).with_content_description(Some("Verbs".into()));

        let outcome = fx.flow.run(&request).await.unwrap();
        assert_eq!(outcome.title, "Verbs - 2 cards");
    }

    #[tokio::test]
    async fn test_ocr_failure_persists_nothing() {
        let failure = Err(AppError::from(ExternalServiceError::EmptyCompletion { model: "ocr".into() }));
        let fx = fixture(vec![Ok("first".into()), failure], Arc::new(FixedTitle("x")));

        let result = fx.flow.run(&ProcessRequest::new(images(3))).await;

        assert!(matches!(result, Err(AppError::External(_))));
        assert_eq!(fx.ocr.seen.lock().unwrap().len(), 2);
        assert!(fx.generator.seen.lock().unwrap().is_none());
        assert_eq!(fx.store.count("Uploads"), 0);
        assert_eq!(fx.store.count("Flashcards"), 0);
    }

    #[tokio::test]
    async fn test_empty_generation_reply_persists_nothing() {
        use crate::services::{ChatModel, ChatRequest};

        /// OCR 正常返回，卡片生成返回空字符串
        struct SilentGenerator;

        impl ChatModel for SilentGenerator {
            fn model_name(&self) -> &str {
                "silent"
            }

            fn complete<'a>(&'a self, request: ChatRequest<'a>) -> BoxFuture<'a, AppResult<String>> {
                let reply = if request.images.is_empty() { "" } else { "hola = hello" };
                Box::pin(future::ready(Ok(reply.to_string())))
            }
        }

        let config = Config::default();
        let store = Arc::new(InMemoryStore::new());
        let repository = StudyRepository::new(store.clone(), &config).unwrap();
        let flow = GenerationFlow::new(AiServices::with_model(Arc::new(SilentGenerator)), repository, &config);

        let request = ProcessRequest::new(images(1)).with_course(Some("Spanish".into()));
        let result = flow.run(&request).await;

        assert!(matches!(
            result,
            Err(AppError::External(ExternalServiceError::EmptyCompletion { .. }))
        ));
        assert_eq!(store.count("Uploads"), 0);
        assert_eq!(store.count("Flashcards"), 0);
    }

    #[tokio::test]
    async fn test_no_images_is_rejected_before_any_call() {
        let fx = fixture(Vec::new(), Arc::new(FixedTitle("x")));

        let result = fx.flow.run(&ProcessRequest::new(Vec::new())).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(fx.ocr.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_incremental_counts_previous_uploads_in_group() {
        let fx = fixture(vec![Ok("a".into())], Arc::new(FailingTitle));
        let mut previous = crate::models::Fields::new();
        previous.insert("date".into(), serde_json::json!("2025-01-01T00:00:00.000Z"));
        previous.insert("summary".into(), serde_json::json!("Travel - 4 cards"));
        previous.insert("course".into(), serde_json::json!("Spanish"));
        fx.store.create("Uploads", vec![previous]).await.unwrap();

        let request = ProcessRequest::new(images(1))
            .with_course(Some("Spanish".into()))
            .with_group(Some("Travel".into()));
        let outcome = fx.flow.run(&request).await.unwrap();

        assert_eq!(outcome.title, "Travel #2 - 2 cards");
        assert_eq!(fx.store.count("Uploads"), 2);
    }
}
