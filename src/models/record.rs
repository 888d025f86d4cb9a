//! 数据表存储的通用记录结构
//!
//! 存储层只认识 `{id, fields}`，业务实体的转换在仓储层完成

use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 记录字段集合
pub type Fields = Map<String, Value>;

/// 存储中的一条记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
}

/// 更新请求：按 id 覆盖部分字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub id: String,
    pub fields: Fields,
}

/// upsert 输入：有 id 走更新，没有 id 走创建
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpsertRecord {
    pub id: Option<String>,
    pub fields: Fields,
}

/// 筛选条件
///
/// 渲染为 Airtable 公式，也可以在内存中直接求值
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `{field} = "value"`
    Equals { field: String, value: String },
    /// `AND(a, b, ...)`
    And(Vec<Filter>),
}

impl Filter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Filter::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// 渲染为 Airtable 公式
    pub fn to_formula(&self) -> String {
        match self {
            Filter::Equals { field, value } => {
                format!("{{{}}} = \"{}\"", field, escape_formula_string(value))
            }
            Filter::And(parts) => {
                let parts: Vec<String> = parts.iter().map(Filter::to_formula).collect();
                format!("AND({})", parts.join(", "))
            }
        }
    }

    /// 在内存中判断一组字段是否满足条件
    ///
    /// 缺失字段按空字符串处理，与 Airtable 的公式语义一致
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Equals { field, value } => {
                let actual = match fields.get(field) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                actual == *value
            }
            Filter::And(parts) => parts.iter().all(|part| part.matches(fields)),
        }
    }
}

fn escape_formula_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// 排序方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// 排序字段
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// 列表查询参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: Option<Filter>,
    pub sort: Vec<Sort>,
}

impl ListQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filtered(filter: Filter) -> Self {
        Self {
            filter: Some(filter),
            sort: Vec::new(),
        }
    }

    pub fn sorted_by(mut self, sort: Sort) -> Self {
        self.sort.push(sort);
        self
    }
}

// ========== 字段读取（结构校验边界） ==========

impl Record {
    /// 读取必填字符串字段
    pub(crate) fn required_str(&self, field: &'static str) -> Result<String, SchemaError> {
        match self.fields.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            None | Some(Value::Null) => Err(SchemaError::MissingField {
                record_id: self.id.clone(),
                field,
            }),
            Some(_) => Err(self.wrong_type(field, "string")),
        }
    }

    /// 读取可选字符串字段，空字符串视为缺失
    pub(crate) fn optional_str(&self, field: &'static str) -> Result<Option<String>, SchemaError> {
        match self.fields.get(field) {
            Some(Value::String(s)) if s.is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            None | Some(Value::Null) => Ok(None),
            Some(_) => Err(self.wrong_type(field, "string")),
        }
    }

    /// 读取非负整数字段，缺失时为 0（Airtable 不返回空单元格）
    pub(crate) fn count_or_zero(&self, field: &'static str) -> Result<u32, SchemaError> {
        match self.fields.get(field) {
            None | Some(Value::Null) => Ok(0),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| self.wrong_type(field, "non-negative integer")),
            Some(_) => Err(self.wrong_type(field, "non-negative integer")),
        }
    }

    fn wrong_type(&self, field: &'static str, expected: &'static str) -> SchemaError {
        SchemaError::WrongType {
            record_id: self.id.clone(),
            field,
            expected,
        }
    }
}

/// 只在值存在时写入字段，避免向存储发送显式 null
pub(crate) fn insert_optional(fields: &mut Fields, key: &str, value: Option<String>) {
    if let Some(value) = value {
        fields.insert(key.to_string(), Value::String(value));
    }
}
