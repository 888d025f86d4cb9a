//! 业务能力层（Service Layer）
//!
//! ## 职责
//!
//! 提供各种"能力"，不关心流程顺序：
//! - `llm_service`: 通用对话补全（`ChatModel`）
//! - `ocr` / `flashcard_generator` / `title_generator`: 基于 `ChatModel` 的三种 AI 能力，各自带离线模拟实现
//! - `upload_namer`: 分组名、序号、上传标题
//! - `study_repository`: 卡片 / 上传记录的读写
//! - `library_service`: 课程、分组浏览与重命名
//!
//! 真实实现还是模拟实现由 `Config::ai_backend` 显式决定，不看环境里有没有 API Key。

pub mod flashcard_generator;
pub mod library_service;
pub mod llm_service;
pub mod ocr;
pub mod study_repository;
pub mod title_generator;
pub mod upload_namer;

pub use flashcard_generator::{FlashcardGenerator, LlmFlashcardGenerator, MockFlashcardGenerator};
pub use library_service::LibraryService;
pub use llm_service::{ChatModel, ChatRequest, LlmService};
pub use ocr::{LlmOcrService, MockOcrService, OcrService};
pub use study_repository::StudyRepository;
pub use title_generator::{ContentTitleGenerator, LlmTitleGenerator, MockTitleGenerator};

use crate::config::{AiBackend, Config};
use std::sync::Arc;
use tracing::info;

/// 生成流程用到的三种 AI 能力
#[derive(Clone)]
pub struct AiServices {
    pub ocr: Arc<dyn OcrService>,
    pub generator: Arc<dyn FlashcardGenerator>,
    pub title_generator: Arc<dyn ContentTitleGenerator>,
}

impl AiServices {
    /// 按配置选择实现
    pub fn from_config(config: &Config) -> Self {
        match config.ai_backend {
            AiBackend::OpenAi => {
                info!("🤖 AI 后端: OpenAI 兼容接口, 模型: {}", config.llm_model_name);
                Self::with_model(Arc::new(LlmService::new(config)))
            }
            AiBackend::Mock => {
                info!("🤖 AI 后端: 模拟实现");
                Self::mock()
            }
        }
    }

    /// 三种能力共用同一个对话模型
    pub fn with_model(model: Arc<dyn ChatModel>) -> Self {
        Self {
            ocr: Arc::new(LlmOcrService::new(model.clone())),
            generator: Arc::new(LlmFlashcardGenerator::new(model.clone())),
            title_generator: Arc::new(LlmTitleGenerator::new(model)),
        }
    }

    /// 离线模拟实现
    pub fn mock() -> Self {
        Self {
            ocr: Arc::new(MockOcrService),
            generator: Arc::new(MockFlashcardGenerator),
            title_generator: Arc::new(MockTitleGenerator),
        }
    }
}
