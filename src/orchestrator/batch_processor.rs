//! 分批处理器 - 编排层
//!
//! ## 职责
//!
//! 存储每个写请求最多接受 10 条记录。本模块把任意长度的创建 / 更新 / 删除列表
//! 切成连续的批次，逐批顺序发送，并按批次顺序拼接结果。
//!
//! ## 失败语义
//!
//! - 任一批次失败立即返回错误，不重试
//! - 之前已经成功的批次保留在存储中，不做回滚
//! - 空输入不发送任何请求

use crate::error::{AppResult, ValidationError};
use crate::infrastructure::RecordStore;
use crate::models::{Fields, Record, RecordUpdate, UpsertRecord};
use std::sync::Arc;
use tracing::info;

/// 存储单次写请求的记录上限
pub const MAX_RECORDS_PER_REQUEST: usize = 10;

/// 分批处理器
#[derive(Clone)]
pub struct BatchProcessor {
    store: Arc<dyn RecordStore>,
    batch_size: usize,
}

impl BatchProcessor {
    /// 使用默认批次大小（10）
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            batch_size: MAX_RECORDS_PER_REQUEST,
        }
    }

    /// 使用自定义批次大小，必须为正整数
    pub fn with_batch_size(store: Arc<dyn RecordStore>, batch_size: usize) -> AppResult<Self> {
        if batch_size == 0 {
            return Err(ValidationError::InvalidChunkSize(batch_size).into());
        }
        Ok(Self { store, batch_size })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 分批创建，按输入顺序返回创建结果
    pub async fn batch_create(&self, table: &str, records: Vec<Fields>) -> AppResult<Vec<Record>> {
        let total_batches = total_batches(records.len(), self.batch_size);
        let mut all_created = Vec::with_capacity(records.len());

        for (index, batch) in chunked(records, self.batch_size).into_iter().enumerate() {
            info!("📦 正在创建第 {}/{} 批 ({} 条)", index + 1, total_batches, batch.len());
            let created = self.store.create(table, batch).await?;
            all_created.extend(created);
        }

        Ok(all_created)
    }

    /// 分批更新
    pub async fn batch_update(&self, table: &str, updates: Vec<RecordUpdate>) -> AppResult<()> {
        let total_batches = total_batches(updates.len(), self.batch_size);

        for (index, batch) in chunked(updates, self.batch_size).into_iter().enumerate() {
            info!("📦 正在更新第 {}/{} 批 ({} 条)", index + 1, total_batches, batch.len());
            self.store.update(table, batch).await?;
        }

        Ok(())
    }

    /// 分批删除
    pub async fn batch_delete(&self, table: &str, ids: Vec<String>) -> AppResult<()> {
        let total_batches = total_batches(ids.len(), self.batch_size);

        for (index, batch) in chunked(ids, self.batch_size).into_iter().enumerate() {
            info!("📦 正在删除第 {}/{} 批 ({} 条)", index + 1, total_batches, batch.len());
            self.store.destroy(table, batch).await?;
        }

        Ok(())
    }

    /// 有 id 的记录走更新，没有 id 的走创建
    ///
    /// 先创建后更新；只返回新创建的记录，更新结果被丢弃
    pub async fn batch_upsert(&self, table: &str, records: Vec<UpsertRecord>) -> AppResult<Vec<Record>> {
        let mut to_create = Vec::new();
        let mut to_update = Vec::new();

        for record in records {
            match record.id {
                Some(id) => to_update.push(RecordUpdate {
                    id,
                    fields: record.fields,
                }),
                None => to_create.push(record.fields),
            }
        }

        let created = self.batch_create(table, to_create).await?;
        self.batch_update(table, to_update).await?;

        Ok(created)
    }
}

/// 批次总数（向上取整）
fn total_batches(len: usize, batch_size: usize) -> usize {
    (len + batch_size - 1) / batch_size
}

/// 按顺序切分为若干批，每批最多 `batch_size` 条
fn chunked<T>(items: Vec<T>, batch_size: usize) -> Vec<Vec<T>> {
    let mut batches = Vec::with_capacity(total_batches(items.len(), batch_size));
    let mut iter = items.into_iter().peekable();

    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(batch_size).collect());
    }

    batches
}
