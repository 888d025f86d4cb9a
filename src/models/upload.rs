use crate::error::SchemaError;
use crate::models::record::{insert_optional, Fields, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 上传记录表字段名
pub mod field {
    pub const UPLOAD_ID: &str = "uploadId";
    pub const DATE: &str = "date";
    pub const SUMMARY: &str = "summary";
    pub const BOOK_PAGE: &str = "bookPage";
    pub const COURSE: &str = "course";
    pub const IMAGE_COUNT: &str = "imageCount";
    pub const FOCUS_PROMPT: &str = "focusPrompt";
}

/// 一次上传（一次生成流程）的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Upload {
    /// 存储分配的记录 ID
    pub id: String,
    /// 客户端生成的引用（`upload_<毫秒时间戳>`），卡片通过它关联上传
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// ISO-8601 时间
    pub date: String,
    /// 显示标题
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    pub image_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focus_prompt: Option<String>,
}

impl Upload {
    /// 卡片上记录的关联值：优先客户端引用，旧数据退回记录 ID
    pub fn matches_reference(&self, upload_ref: &str) -> bool {
        self.reference.as_deref() == Some(upload_ref) || self.id == upload_ref
    }
}

impl TryFrom<Record> for Upload {
    type Error = SchemaError;

    fn try_from(record: Record) -> Result<Self, Self::Error> {
        Ok(Self {
            reference: record.optional_str(field::UPLOAD_ID)?,
            date: record.required_str(field::DATE)?,
            summary: record.required_str(field::SUMMARY)?,
            book_page: record.optional_str(field::BOOK_PAGE)?,
            course: record.optional_str(field::COURSE)?,
            image_count: record.count_or_zero(field::IMAGE_COUNT)?,
            focus_prompt: record.optional_str(field::FOCUS_PROMPT)?,
            id: record.id,
        })
    }
}

/// 待创建的上传记录
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewUpload {
    pub date: String,
    pub summary: String,
    pub book_page: Option<String>,
    pub course: Option<String>,
    pub image_count: u32,
    pub focus_prompt: Option<String>,
}

impl NewUpload {
    /// 转换为存储字段，`reference` 由仓储层生成
    pub fn into_fields(self, reference: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::UPLOAD_ID.to_string(), Value::String(reference.to_string()));
        fields.insert(field::DATE.to_string(), Value::String(self.date));
        fields.insert(field::SUMMARY.to_string(), Value::String(self.summary));
        fields.insert(field::IMAGE_COUNT.to_string(), Value::from(self.image_count));
        insert_optional(&mut fields, field::BOOK_PAGE, self.book_page);
        insert_optional(&mut fields, field::COURSE, self.course);
        insert_optional(&mut fields, field::FOCUS_PROMPT, self.focus_prompt);
        fields
    }
}

/// 带卡片数量的上传记录（按分组浏览时使用）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    #[serde(flatten)]
    pub upload: Upload,
    pub flashcard_count: usize,
}
