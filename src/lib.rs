//! # StudyCard
//!
//! 把拍下来的学习资料转换成问答卡片，并按"课程 → 分组"两级组织保存到 Airtable
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 数据表存储，只暴露"列表 / 创建 / 更新 / 删除"能力
//! - `AirtableClient` - Airtable REST 客户端
//! - `InMemoryStore` - 进程内存储（本地开发和测试）
//!
//! ### ② 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 写操作按每批 10 条切分，逐批顺序发送
//!
//! ### ③ 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `StudyRepository` - 卡片 / 上传记录读写
//! - `LibraryService` - 课程、分组浏览与重命名
//! - `OcrService` / `FlashcardGenerator` / `ContentTitleGenerator` - AI 能力
//! - `upload_namer` - 分组名、序号、上传标题
//!
//! ### ④ 流程层（Workflow）
//! - `workflow/` - 定义"一次上传"的完整处理流程
//! - `ProcessRequest` - 请求封装（图片 + 课程 / 分组 / 提示词）
//! - `GenerationFlow` - 流程编排（OCR → 生成 → 命名 → 保存）
//!
//! ### ⑤ 接口层（Server）
//! - `server/` - axum 路由和处理函数
//!
//! ## 模块结构

pub mod app;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod server;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::{AiBackend, Config, StoreBackend};
pub use error::{AppError, AppResult};
pub use infrastructure::{AirtableClient, InMemoryStore, RecordStore};
pub use models::{Flashcard, GeneratedCard, Upload};
pub use orchestrator::BatchProcessor;
pub use services::{AiServices, LibraryService, StudyRepository};
pub use workflow::{GenerationFlow, ImageInput, ProcessOutcome, ProcessRequest};
