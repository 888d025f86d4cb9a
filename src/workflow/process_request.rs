//! 生成请求
//!
//! 封装"一次上传要处理哪些图片、归到哪里"这一信息

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt::Display;

use crate::error::{AppResult, ValidationError};

/// 上传的一张图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    /// MIME 类型，例如 `image/png`
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageInput {
    pub fn new(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            bytes,
        }
    }

    /// `data:{mime};base64,{内容}`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.content_type, STANDARD.encode(&self.bytes))
    }
}

/// 一次生成请求
///
/// 可选字段里的空字符串视为未填写
#[derive(Debug, Clone, Default)]
pub struct ProcessRequest {
    pub images: Vec<ImageInput>,
    /// 用户对生成内容的额外要求
    pub prompt: Option<String>,
    pub course: Option<String>,
    pub group: Option<String>,
    /// 用户给出的内容描述，存在时直接用作标题
    pub content_description: Option<String>,
}

impl ProcessRequest {
    pub fn new(images: Vec<ImageInput>) -> Self {
        Self {
            images,
            ..Default::default()
        }
    }

    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.prompt = non_empty(prompt);
        self
    }

    pub fn with_course(mut self, course: Option<String>) -> Self {
        self.course = non_empty(course);
        self
    }

    pub fn with_group(mut self, group: Option<String>) -> Self {
        self.group = non_empty(group);
        self
    }

    pub fn with_content_description(mut self, description: Option<String>) -> Self {
        self.content_description = non_empty(description);
        self
    }

    /// 在任何外部调用之前检查图片数量
    pub fn validate(&self, max_images: usize) -> AppResult<()> {
        if self.images.is_empty() {
            return Err(ValidationError::NoImages.into());
        }
        if self.images.len() > max_images {
            return Err(ValidationError::TooManyImages {
                count: self.images.len(),
                max: max_images,
            }
            .into());
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Display for ProcessRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[图片#{} 课程#{} 分组#{}]",
            self.images.len(),
            self.course.as_deref().unwrap_or("-"),
            self.group.as_deref().unwrap_or("-")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn png() -> ImageInput {
        ImageInput::new("image/png", vec![0x89, b'P', b'N', b'G'])
    }

    #[test]
    fn test_data_uri() {
        assert_eq!(png().to_data_uri(), "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_empty_strings_are_absent() {
        let request = ProcessRequest::new(vec![png()])
            .with_prompt(Some("".into()))
            .with_course(Some("  ".into()))
            .with_group(Some("Travel".into()))
            .with_content_description(None);

        assert_eq!(request.prompt, None);
        assert_eq!(request.course, None);
        assert_eq!(request.group.as_deref(), Some("Travel"));
        assert_eq!(request.content_description, None);
    }

    #[test]
    fn test_validate_image_count() {
        assert!(matches!(
            ProcessRequest::new(Vec::new()).validate(10),
            Err(AppError::Validation(ValidationError::NoImages))
        ));
        assert!(matches!(
            ProcessRequest::new(vec![png(); 11]).validate(10),
            Err(AppError::Validation(ValidationError::TooManyImages { count: 11, max: 10 }))
        ));
        assert!(ProcessRequest::new(vec![png(); 10]).validate(10).is_ok());
    }

    #[test]
    fn test_display() {
        let request = ProcessRequest::new(vec![png(), png()]).with_course(Some("Spanish".into()));
        assert_eq!(request.to_string(), "[图片#2 课程#Spanish 分组#-]");
    }
}
