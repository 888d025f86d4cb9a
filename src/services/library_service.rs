//! 课程库浏览服务 - 业务能力层
//!
//! 课程和分组没有独立的表，全部从卡片的 `course` / `group` 字段扫描去重得到。
//! 重命名就是批量改写匹配卡片的字段。

use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{flashcard, Fields, Filter, Flashcard, RecordUpdate, Upload, UploadSummary};
use crate::services::study_repository::StudyRepository;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use tracing::info;

/// 课程库浏览服务
#[derive(Clone)]
pub struct LibraryService {
    repository: StudyRepository,
}

impl LibraryService {
    pub fn new(repository: StudyRepository) -> Self {
        Self { repository }
    }

    /// 所有课程名（去重，保持首次出现顺序）
    pub async fn courses(&self) -> AppResult<Vec<String>> {
        let cards = self.repository.get_flashcards(None).await?;
        Ok(distinct(cards.iter().filter_map(|card| card.course.as_deref())))
    }

    /// 某课程下的所有分组名；未指定课程时为空
    pub async fn groups(&self, course: Option<&str>) -> AppResult<Vec<String>> {
        let Some(course) = course else {
            return Ok(Vec::new());
        };

        let cards = self.repository.get_flashcards(None).await?;
        Ok(distinct(
            cards
                .iter()
                .filter(|card| card.course.as_deref() == Some(course))
                .filter_map(|card| card.group.as_deref()),
        ))
    }

    /// 上传记录（按日期倒序），可按课程筛选
    pub async fn uploads(&self, course: Option<&str>) -> AppResult<Vec<Upload>> {
        let uploads = self.repository.get_uploads().await?;
        Ok(match course {
            Some(course) => uploads
                .into_iter()
                .filter(|upload| upload.course.as_deref() == Some(course))
                .collect(),
            None => uploads,
        })
    }

    /// 某分组的上传记录及每次上传的卡片数
    ///
    /// 按日期倒序；同一时间的按标题中的 `#N` 升序
    pub async fn uploads_by_group(&self, course: &str, group: &str) -> AppResult<Vec<UploadSummary>> {
        let cards = self.repository.get_flashcards(None).await?;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for card in cards
            .iter()
            .filter(|card| card.course.as_deref() == Some(course) && card.group.as_deref() == Some(group))
        {
            if let Some(upload_ref) = card.upload_id.as_deref() {
                *counts.entry(upload_ref).or_default() += 1;
            }
        }

        let uploads = self.repository.get_uploads().await?;
        let mut summaries: Vec<UploadSummary> = uploads
            .into_iter()
            .filter_map(|upload| {
                let flashcard_count = counts
                    .iter()
                    .filter(|(upload_ref, _)| upload.matches_reference(upload_ref))
                    .map(|(_, count)| *count)
                    .sum::<usize>();
                (flashcard_count > 0).then_some(UploadSummary {
                    upload,
                    flashcard_count,
                })
            })
            .collect();

        summaries.sort_by_cached_key(|summary| upload_sort_key(&summary.upload));
        Ok(summaries)
    }

    /// 依次读取多个上传的卡片并拼接
    pub async fn flashcards_for_uploads(&self, upload_refs: &[String]) -> AppResult<Vec<Flashcard>> {
        let mut all_cards = Vec::new();
        for upload_ref in upload_refs {
            let cards = self.repository.get_flashcards(Some(upload_ref)).await?;
            all_cards.extend(cards);
        }
        Ok(all_cards)
    }

    /// 重命名课程，返回改写的卡片数
    pub async fn rename_course(&self, old_name: &str, new_name: &str) -> AppResult<usize> {
        require("oldName", old_name)?;
        require("newName", new_name)?;

        let filter = Filter::equals(flashcard::field::COURSE, old_name);
        let updated = self
            .rename_matching(filter, flashcard::field::COURSE, new_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("课程 {}", old_name)))?;

        info!("✏️ 课程 {} → {}，更新 {} 张卡片", old_name, new_name, updated);
        Ok(updated)
    }

    /// 重命名某课程下的分组，返回改写的卡片数
    pub async fn rename_group(&self, course: &str, old_name: &str, new_name: &str) -> AppResult<usize> {
        require("course", course)?;
        require("oldName", old_name)?;
        require("newName", new_name)?;

        let filter = Filter::And(vec![
            Filter::equals(flashcard::field::COURSE, course),
            Filter::equals(flashcard::field::GROUP, old_name),
        ]);
        let updated = self
            .rename_matching(filter, flashcard::field::GROUP, new_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("课程 {} 的分组 {}", course, old_name)))?;

        info!("✏️ 分组 {} → {}（{}），更新 {} 张卡片", old_name, new_name, course, updated);
        Ok(updated)
    }

    /// 把匹配卡片的某个字段改成新值；没有匹配时返回 `None`
    async fn rename_matching(&self, filter: Filter, field: &str, new_value: &str) -> AppResult<Option<usize>> {
        let cards = self.repository.find_flashcards(filter).await?;
        if cards.is_empty() {
            return Ok(None);
        }

        let updates: Vec<RecordUpdate> = cards
            .into_iter()
            .map(|card| {
                let mut fields = Fields::new();
                fields.insert(field.to_string(), Value::String(new_value.to_string()));
                RecordUpdate { id: card.id, fields }
            })
            .collect();
        let count = updates.len();

        self.repository.update_flashcards(updates).await?;
        Ok(Some(count))
    }
}

fn require(name: &'static str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(name).into());
    }
    Ok(())
}

/// 去掉空值后去重，保持首次出现顺序
fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|value| !value.is_empty() && seen.insert(*value))
        .map(str::to_string)
        .collect()
}

/// 上传记录的排序键：日期倒序，同一时间按标题中的 `#N` 升序，没有序号的排在最后
///
/// 能解析的日期按时间比较并排在前面，解析不了的按原始字符串倒序排在后面
fn upload_sort_key(upload: &Upload) -> (Reverse<(Option<DateTime<Utc>>, String)>, u64) {
    (
        Reverse((parse_date(&upload.date), upload.date.clone())),
        sequence_number(&upload.summary).unwrap_or(u64::MAX),
    )
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// 标题中第一个 `#数字`
fn sequence_number(summary: &str) -> Option<u64> {
    let re = Regex::new(r"#(\d+)").ok()?;
    re.captures(summary)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
