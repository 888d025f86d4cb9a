//! HTTP 错误响应
//!
//! - `Validation` → 400
//! - `NotFound` → 404
//! - 其余 → 500，响应体不暴露具体原因，原因写入日志

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::{AppError, ValidationError};

/// 处理函数返回的错误
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        ApiError(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError(e.into())
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("❌ 请求处理失败: {}", self.0);
            "Internal server error".to_string()
        } else {
            warn!("⚠️ 请求被拒绝 ({}): {}", status.as_u16(), self.0);
            self.0.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExternalServiceError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::from(ValidationError::NoImages).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError(AppError::NotFound("课程 X".into())).status(),
            StatusCode::NOT_FOUND
        );
        let external = ExternalServiceError::RateLimited {
            endpoint: "GET Flashcards".into(),
            retry_after: Some(30),
        };
        assert_eq!(ApiError::from(AppError::from(external)).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_internal_error_body_is_opaque() {
        let response = ApiError::from(AppError::from(ExternalServiceError::BadResponse {
            endpoint: "POST Uploads".into(),
            status: 422,
            body: "secret details".into(),
        }))
        .into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!body.contains("secret"));
        assert!(body.contains("\"error\""));
    }
}
