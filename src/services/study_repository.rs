//! 学习数据仓储 - 业务能力层
//!
//! 在存储的通用记录（`{id, fields}`）和 `Flashcard` / `Upload` 之间转换：
//! - 写入时不发送缺失的可选字段
//! - 读取时经过结构校验，字段类型不对直接返回 `SchemaError`
//! - 卡片批量写入交给 `BatchProcessor`

use crate::config::Config;
use crate::error::{AppError, AppResult, ExternalServiceError};
use crate::infrastructure::RecordStore;
use crate::models::{
    flashcard, upload, Filter, Flashcard, ListQuery, NewFlashcard, NewUpload, Record, RecordUpdate, Sort, Upload,
};
use crate::orchestrator::BatchProcessor;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// 学习数据仓储
#[derive(Clone)]
pub struct StudyRepository {
    store: Arc<dyn RecordStore>,
    batch: BatchProcessor,
    flashcards_table: String,
    uploads_table: String,
}

impl StudyRepository {
    pub fn new(store: Arc<dyn RecordStore>, config: &Config) -> AppResult<Self> {
        Ok(Self {
            batch: BatchProcessor::with_batch_size(store.clone(), config.batch_size)?,
            store,
            flashcards_table: config.flashcards_table.clone(),
            uploads_table: config.uploads_table.clone(),
        })
    }

    /// 批量创建卡片，按输入顺序返回
    pub async fn create_flashcards(&self, cards: Vec<NewFlashcard>) -> AppResult<Vec<Flashcard>> {
        let fields = cards.into_iter().map(NewFlashcard::into_fields).collect();
        let records = self.batch.batch_create(&self.flashcards_table, fields).await?;
        info!("💾 保存了 {} 张卡片", records.len());
        to_entities(records)
    }

    /// 读取卡片；给出上传引用时只返回该上传的卡片
    pub async fn get_flashcards(&self, upload_ref: Option<&str>) -> AppResult<Vec<Flashcard>> {
        let query = match upload_ref {
            Some(upload_ref) => ListQuery::filtered(Filter::equals(flashcard::field::UPLOAD_ID, upload_ref)),
            None => ListQuery::all(),
        };
        self.list_flashcards(&query).await
    }

    /// 按条件读取卡片
    pub async fn find_flashcards(&self, filter: Filter) -> AppResult<Vec<Flashcard>> {
        self.list_flashcards(&ListQuery::filtered(filter)).await
    }

    async fn list_flashcards(&self, query: &ListQuery) -> AppResult<Vec<Flashcard>> {
        let records = self.store.list(&self.flashcards_table, query).await?;
        debug!("读取到 {} 张卡片", records.len());
        to_entities(records)
    }

    /// 批量更新卡片字段
    pub async fn update_flashcards(&self, updates: Vec<RecordUpdate>) -> AppResult<()> {
        self.batch.batch_update(&self.flashcards_table, updates).await
    }

    /// 创建上传记录（单条写入）
    ///
    /// 生成客户端引用 `upload_<毫秒时间戳>`，与存储分配的 id 不同，只用于给卡片打标签
    pub async fn create_upload(&self, new_upload: NewUpload) -> AppResult<Upload> {
        let reference = format!("upload_{}", Utc::now().timestamp_millis());
        let fields = new_upload.into_fields(&reference);

        let record = self
            .store
            .create(&self.uploads_table, vec![fields])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ExternalServiceError::BadResponse {
                endpoint: format!("POST {}", self.uploads_table),
                status: 200,
                body: "未返回新建的记录".to_string(),
            })?;

        info!("💾 创建上传记录: {} ({})", reference, record.id);
        Ok(Upload::try_from(record)?)
    }

    /// 读取全部上传记录，按日期倒序
    pub async fn get_uploads(&self) -> AppResult<Vec<Upload>> {
        let query = ListQuery::all().sorted_by(Sort::desc(upload::field::DATE));
        let records = self.store.list(&self.uploads_table, &query).await?;
        debug!("读取到 {} 条上传记录", records.len());
        to_entities(records)
    }
}

fn to_entities<T>(records: Vec<Record>) -> AppResult<Vec<T>>
where
    T: TryFrom<Record>,
    AppError: From<T::Error>,
{
    records
        .into_iter()
        .map(|record| T::try_from(record).map_err(AppError::from))
        .collect()
}
