//! HTTP 接口层
//!
//! 只做参数解析和响应序列化，业务交给 `LibraryService` 和 `GenerationFlow`

pub mod error;
pub mod handlers;

pub use error::ApiError;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::services::LibraryService;
use crate::workflow::GenerationFlow;

/// 处理函数共享的状态
#[derive(Clone)]
pub struct AppState {
    pub library: LibraryService,
    pub flow: GenerationFlow,
}

/// 构建 `/api` 路由
///
/// `max_upload_bytes` 限制请求体大小（主要针对图片上传）
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let api = Router::new()
        .route("/courses", get(handlers::courses))
        .route("/courses/rename", post(handlers::rename_course))
        .route("/groups", get(handlers::groups))
        .route("/groups/rename", post(handlers::rename_group))
        .route("/uploads", get(handlers::uploads))
        .route("/uploads-by-group", get(handlers::uploads_by_group))
        .route("/flashcards/multiple", post(handlers::flashcards_multiple))
        .route("/flashcards/{id}", get(handlers::flashcards_by_upload))
        .route("/process", post(handlers::process));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
