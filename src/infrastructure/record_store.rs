//! 数据表存储抽象 - 基础设施层
//!
//! 只暴露"列表 / 创建 / 更新 / 删除"能力，不认识卡片和上传记录

use crate::error::AppResult;
use crate::models::{Fields, ListQuery, Record, RecordUpdate};
use futures::future::BoxFuture;

/// 数据表存储
///
/// 职责：
/// - 对单个表执行一次请求
/// - `list` 需要透明地翻完所有分页
/// - 不做分批：每次写请求的记录数由调用方（`BatchProcessor`）控制
pub trait RecordStore: Send + Sync {
    /// 后端名称（仅用于日志）
    fn name(&self) -> &'static str;

    /// 列出满足条件的全部记录
    fn list<'a>(&'a self, table: &'a str, query: &'a ListQuery) -> BoxFuture<'a, AppResult<Vec<Record>>>;

    /// 创建记录，按输入顺序返回
    fn create<'a>(&'a self, table: &'a str, records: Vec<Fields>) -> BoxFuture<'a, AppResult<Vec<Record>>>;

    /// 按 id 更新部分字段
    fn update<'a>(
        &'a self,
        table: &'a str,
        updates: Vec<RecordUpdate>,
    ) -> BoxFuture<'a, AppResult<Vec<Record>>>;

    /// 按 id 删除，返回被删除的 id
    fn destroy<'a>(&'a self, table: &'a str, ids: Vec<String>) -> BoxFuture<'a, AppResult<Vec<String>>>;
}
