use crate::error::SchemaError;
use crate::models::record::{insert_optional, Fields, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 卡片表字段名
pub mod field {
    pub const FRONT: &str = "front";
    pub const BACK: &str = "back";
    pub const COURSE: &str = "course";
    pub const GROUP: &str = "group";
    pub const UPLOAD_ID: &str = "uploadId";
}

/// 已保存的卡片
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flashcard {
    pub id: String,
    pub front: String,
    pub back: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl TryFrom<Record> for Flashcard {
    type Error = SchemaError;

    fn try_from(record: Record) -> Result<Self, Self::Error> {
        Ok(Self {
            front: record.required_str(field::FRONT)?,
            back: record.required_str(field::BACK)?,
            course: record.optional_str(field::COURSE)?,
            group: record.optional_str(field::GROUP)?,
            upload_id: record.optional_str(field::UPLOAD_ID)?,
            created_at: record.created_time.clone(),
            id: record.id,
        })
    }
}

/// 待创建的卡片
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewFlashcard {
    pub front: String,
    pub back: String,
    pub course: Option<String>,
    pub group: Option<String>,
    pub upload_id: Option<String>,
}

impl NewFlashcard {
    /// 转换为存储字段，缺失的可选字段不写入
    pub fn into_fields(self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::FRONT.to_string(), Value::String(self.front));
        fields.insert(field::BACK.to_string(), Value::String(self.back));
        insert_optional(&mut fields, field::COURSE, self.course);
        insert_optional(&mut fields, field::GROUP, self.group);
        insert_optional(&mut fields, field::UPLOAD_ID, self.upload_id);
        fields
    }
}

/// LLM 生成的问答对
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedCard {
    pub front: String,
    pub back: String,
}

impl GeneratedCard {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }
}
