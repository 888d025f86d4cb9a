//! 进程内数据表存储 - 基础设施层
//!
//! 行为与 Airtable 保持一致：服务端分配 `rec` 前缀的 id、按公式筛选、按字段排序。
//! 用于本地开发（`store_backend = "memory"`）和测试。

use crate::error::{AppError, AppResult};
use crate::infrastructure::RecordStore;
use crate::models::{Fields, ListQuery, Record, RecordUpdate, SortDirection};
use chrono::{SecondsFormat, Utc};
use futures::future::{self, BoxFuture};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;

/// 进程内存储
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<HashMap<String, Vec<Record>>>,
    next_id: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入已有记录（用于准备测试数据）
    pub fn seed(&self, table: &str, records: Vec<Record>) {
        let mut tables = self.lock_tables();
        tables.entry(table.to_string()).or_default().extend(records);
    }

    /// 表中记录数
    pub fn count(&self, table: &str) -> usize {
        self.lock_tables().get(table).map_or(0, Vec::len)
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Record>>> {
        // 锁只在同步代码中持有，中毒时沿用内部数据
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn allocate_id(&self) -> String {
        let n = self.next_id.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        format!("rec{:014}", n)
    }

    fn list_sync(&self, table: &str, query: &ListQuery) -> Vec<Record> {
        let tables = self.lock_tables();
        let mut records: Vec<Record> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| query.filter.as_ref().map_or(true, |f| f.matches(&r.fields)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if !query.sort.is_empty() {
            records.sort_by(|a, b| {
                for sort in &query.sort {
                    let ordering = compare_field(a.fields.get(&sort.field), b.fields.get(&sort.field));
                    let ordering = match sort.direction {
                        SortDirection::Asc => ordering,
                        SortDirection::Desc => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        records
    }

    fn create_sync(&self, table: &str, records: Vec<Fields>) -> Vec<Record> {
        let created_time = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let created: Vec<Record> = records
            .into_iter()
            .map(|fields| Record {
                id: self.allocate_id(),
                fields,
                created_time: Some(created_time.clone()),
            })
            .collect();

        self.lock_tables()
            .entry(table.to_string())
            .or_default()
            .extend(created.iter().cloned());
        created
    }

    fn update_sync(&self, table: &str, updates: Vec<RecordUpdate>) -> AppResult<Vec<Record>> {
        let mut tables = self.lock_tables();
        let rows = tables.entry(table.to_string()).or_default();

        let mut updated = Vec::with_capacity(updates.len());
        for update in updates {
            let row = rows
                .iter_mut()
                .find(|r| r.id == update.id)
                .ok_or_else(|| AppError::NotFound(format!("{} 中的记录 {}", table, update.id)))?;
            row.fields.extend(update.fields);
            updated.push(row.clone());
        }
        Ok(updated)
    }

    fn destroy_sync(&self, table: &str, ids: Vec<String>) -> AppResult<Vec<String>> {
        let mut tables = self.lock_tables();
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(missing) = ids.iter().find(|id| !rows.iter().any(|r| &r.id == *id)) {
            return Err(AppError::NotFound(format!("{} 中的记录 {}", table, missing)));
        }
        rows.retain(|r| !ids.contains(&r.id));
        Ok(ids)
    }
}

/// 排序比较：数字按数值，其余按字符串；缺失值排在最前
fn compare_field(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

impl RecordStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn list<'a>(&'a self, table: &'a str, query: &'a ListQuery) -> BoxFuture<'a, AppResult<Vec<Record>>> {
        Box::pin(future::ready(Ok(self.list_sync(table, query))))
    }

    fn create<'a>(&'a self, table: &'a str, records: Vec<Fields>) -> BoxFuture<'a, AppResult<Vec<Record>>> {
        Box::pin(future::ready(Ok(self.create_sync(table, records))))
    }

    fn update<'a>(
        &'a self,
        table: &'a str,
        updates: Vec<RecordUpdate>,
    ) -> BoxFuture<'a, AppResult<Vec<Record>>> {
        Box::pin(future::ready(self.update_sync(table, updates)))
    }

    fn destroy<'a>(&'a self, table: &'a str, ids: Vec<String>) -> BoxFuture<'a, AppResult<Vec<String>>> {
        Box::pin(future::ready(self.destroy_sync(table, ids)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Filter, Sort};
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_create_then_list_with_filter() {
        let store = InMemoryStore::new();
        tokio_test::block_on(async {
            let created = store
                .create(
                    "Flashcards",
                    vec![
                        fields(json!({ "front": "a", "course": "Spanish" })),
                        fields(json!({ "front": "b", "course": "French" })),
                    ],
                )
                .await
                .unwrap();
            assert_eq!(created.len(), 2);
            assert_ne!(created[0].id, created[1].id);

            let query = ListQuery::filtered(Filter::equals("course", "Spanish"));
            let found = store.list("Flashcards", &query).await.unwrap();
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].fields["front"], json!("a"));
        });
    }

    #[test]
    fn test_list_sorted_desc() {
        let store = InMemoryStore::new();
        tokio_test::block_on(async {
            store
                .create(
                    "Uploads",
                    vec![
                        fields(json!({ "date": "2025-01-01" })),
                        fields(json!({ "date": "2025-03-01" })),
                        fields(json!({ "date": "2025-02-01" })),
                    ],
                )
                .await
                .unwrap();

            let query = ListQuery::all().sorted_by(Sort::desc("date"));
            let dates: Vec<Value> = store
                .list("Uploads", &query)
                .await
                .unwrap()
                .into_iter()
                .map(|r| r.fields["date"].clone())
                .collect();
            assert_eq!(dates, vec![json!("2025-03-01"), json!("2025-02-01"), json!("2025-01-01")]);
        });
    }

    #[test]
    fn test_update_merges_fields_and_rejects_unknown_id() {
        let store = InMemoryStore::new();
        tokio_test::block_on(async {
            let created = store
                .create("Flashcards", vec![fields(json!({ "front": "a", "group": "Old" }))])
                .await
                .unwrap();

            let updated = store
                .update(
                    "Flashcards",
                    vec![RecordUpdate {
                        id: created[0].id.clone(),
                        fields: fields(json!({ "group": "New" })),
                    }],
                )
                .await
                .unwrap();
            assert_eq!(updated[0].fields["group"], json!("New"));
            assert_eq!(updated[0].fields["front"], json!("a"));

            let missing = store
                .update(
                    "Flashcards",
                    vec![RecordUpdate {
                        id: "recMissing".into(),
                        fields: Fields::new(),
                    }],
                )
                .await;
            assert!(matches!(missing, Err(AppError::NotFound(_))));
        });
    }

    #[test]
    fn test_destroy_removes_records() {
        let store = InMemoryStore::new();
        tokio_test::block_on(async {
            let created = store
                .create("Flashcards", vec![fields(json!({ "front": "a" })), fields(json!({ "front": "b" }))])
                .await
                .unwrap();
            let deleted = store
                .destroy("Flashcards", vec![created[0].id.clone()])
                .await
                .unwrap();
            assert_eq!(deleted, vec![created[0].id.clone()]);
            assert_eq!(store.count("Flashcards"), 1);
        });
    }
}
