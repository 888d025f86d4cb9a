//! HTTP 处理函数
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/api/courses` | |
//! | `GET`  | `/api/groups` | `?course=`，未指定课程时返回空列表 |
//! | `GET`  | `/api/uploads` | `?course=` 可选 |
//! | `GET`  | `/api/uploads-by-group` | `?course=&group=` 均必填 |
//! | `GET`  | `/api/flashcards/{id}` | 多个上传引用用逗号分隔 |
//! | `POST` | `/api/flashcards/multiple` | `{"uploadIds": [...]}` |
//! | `POST` | `/api/courses/rename` | `{"oldName", "newName"}` |
//! | `POST` | `/api/groups/rename` | `{"course", "oldName", "newName"}` |
//! | `POST` | `/api/process` | multipart：`image0..`、`prompt`、`course`、`group`、`contentDescription` |

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{multipart::Field, Multipart, Path, Query, State},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::ValidationError;
use crate::models::{Flashcard, Upload, UploadSummary};
use crate::server::{error::ApiError, AppState};
use crate::workflow::{ImageInput, ProcessOutcome, ProcessRequest};

type ApiResult<T> = Result<Json<T>, ApiError>;

// ─── 课程 / 分组 ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CoursesResponse {
    pub courses: Vec<String>,
}

/// `GET /api/courses`
pub async fn courses(State(state): State<AppState>) -> ApiResult<CoursesResponse> {
    let courses = state.library.courses().await?;
    Ok(Json(CoursesResponse { courses }))
}

#[derive(Debug, Default, Deserialize)]
pub struct CourseParams {
    pub course: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    pub groups: Vec<String>,
}

/// `GET /api/groups?course=`
pub async fn groups(State(state): State<AppState>, Query(params): Query<CourseParams>) -> ApiResult<GroupsResponse> {
    let groups = state.library.groups(non_empty(&params.course)).await?;
    Ok(Json(GroupsResponse { groups }))
}

// ─── 上传记录 ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UploadsResponse {
    pub uploads: Vec<Upload>,
}

/// `GET /api/uploads?course=`
pub async fn uploads(State(state): State<AppState>, Query(params): Query<CourseParams>) -> ApiResult<UploadsResponse> {
    let uploads = state.library.uploads(non_empty(&params.course)).await?;
    Ok(Json(UploadsResponse { uploads }))
}

#[derive(Debug, Default, Deserialize)]
pub struct GroupParams {
    pub course: Option<String>,
    pub group: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadSummariesResponse {
    pub uploads: Vec<UploadSummary>,
}

/// `GET /api/uploads-by-group?course=&group=`
pub async fn uploads_by_group(
    State(state): State<AppState>,
    Query(params): Query<GroupParams>,
) -> ApiResult<UploadSummariesResponse> {
    let course = non_empty(&params.course).ok_or(ValidationError::MissingField("course"))?;
    let group = non_empty(&params.group).ok_or(ValidationError::MissingField("group"))?;

    let uploads = state.library.uploads_by_group(course, group).await?;
    Ok(Json(UploadSummariesResponse { uploads }))
}

// ─── 卡片 ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct FlashcardsResponse {
    pub flashcards: Vec<Flashcard>,
}

/// `GET /api/flashcards/{id}`，`id` 可以是逗号分隔的多个上传引用
pub async fn flashcards_by_upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<FlashcardsResponse> {
    let upload_refs: Vec<String> = id
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let flashcards = state.library.flashcards_for_uploads(&upload_refs).await?;
    Ok(Json(FlashcardsResponse { flashcards }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleBody {
    pub upload_ids: Option<Vec<String>>,
}

/// `POST /api/flashcards/multiple`
pub async fn flashcards_multiple(State(state): State<AppState>, body: Bytes) -> ApiResult<FlashcardsResponse> {
    let body: MultipleBody = parse_json(&body)?;
    let upload_refs = body.upload_ids.ok_or(ValidationError::MissingField("uploadIds"))?;

    let flashcards = state.library.flashcards_for_uploads(&upload_refs).await?;
    Ok(Json(FlashcardsResponse { flashcards }))
}

// ─── 重命名 ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameCourseBody {
    #[serde(default)]
    pub old_name: String,
    #[serde(default)]
    pub new_name: String,
}

/// `POST /api/courses/rename`
pub async fn rename_course(State(state): State<AppState>, body: Bytes) -> ApiResult<Value> {
    let body: RenameCourseBody = parse_json(&body)?;
    let updated = state.library.rename_course(&body.old_name, &body.new_name).await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameGroupBody {
    #[serde(default)]
    pub course: String,
    #[serde(default)]
    pub old_name: String,
    #[serde(default)]
    pub new_name: String,
}

/// `POST /api/groups/rename`
pub async fn rename_group(State(state): State<AppState>, body: Bytes) -> ApiResult<Value> {
    let body: RenameGroupBody = parse_json(&body)?;
    let updated = state
        .library
        .rename_group(&body.course, &body.old_name, &body.new_name)
        .await?;
    Ok(Json(json!({ "success": true, "updated": updated })))
}

// ─── 生成 ─────────────────────────────────────────────────────────────────────

/// `POST /api/process`
pub async fn process(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<ProcessOutcome> {
    let mut images: BTreeMap<usize, ImageInput> = BTreeMap::new();
    let mut prompt = None;
    let mut course = None;
    let mut group = None;
    let mut content_description = None;

    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();

        if let Some(index) = image_index(&name) {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(malformed)?;
            if images.insert(index, ImageInput::new(content_type, bytes.to_vec())).is_some() {
                return Err(malformed(format!("重复的图片字段 {}", name)));
            }
            continue;
        }

        match name.as_str() {
            "prompt" => prompt = Some(text(field).await?),
            "course" => course = Some(text(field).await?),
            "group" => group = Some(text(field).await?),
            "contentDescription" => content_description = Some(text(field).await?),
            _ => {}
        }
    }

    let request = ProcessRequest::new(images.into_values().collect())
        .with_prompt(prompt)
        .with_course(course)
        .with_group(group)
        .with_content_description(content_description);

    let outcome = state.flow.run(&request).await?;
    Ok(Json(outcome))
}

/// `image0`、`image1` … 返回序号；只认规范写法，`image01`、`image+1` 不算图片字段
fn image_index(name: &str) -> Option<usize> {
    let digits = name.strip_prefix("image")?;
    let canonical = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if !canonical {
        return None;
    }
    digits.parse().ok()
}

async fn text(field: Field<'_>) -> Result<String, ApiError> {
    field.text().await.map_err(malformed)
}

fn malformed(e: impl std::fmt::Display) -> ApiError {
    ValidationError::Malformed(e.to_string()).into()
}

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(malformed)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}
