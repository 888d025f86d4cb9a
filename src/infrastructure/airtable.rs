//! Airtable REST 客户端 - 基础设施层
//!
//! 持有唯一的 HTTP 客户端和凭据，只暴露单次请求能力。
//! 每个写请求最多 10 条记录的限制由上层 `BatchProcessor` 负责。

use crate::config::Config;
use crate::error::{AppError, AppResult, ConfigError, ExternalServiceError};
use crate::infrastructure::RecordStore;
use crate::models::{Fields, ListQuery, Record, RecordUpdate};
use futures::future::BoxFuture;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::future::Future;
use tracing::{debug, warn};

/// 列表接口单页记录数（Airtable 上限）
const PAGE_SIZE: &str = "100";

/// Airtable 客户端
pub struct AirtableClient {
    http: Client,
    api_base_url: String,
    base_id: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<Record>,
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    records: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct DeletedRecord {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    records: Vec<DeletedRecord>,
}

impl AirtableClient {
    /// 创建新的 Airtable 客户端
    pub fn new(config: &Config) -> Self {
        Self {
            http: Client::new(),
            api_base_url: config.airtable_api_base_url.clone(),
            base_id: config.airtable_base_id.clone(),
            api_key: config.airtable_api_key.clone(),
        }
    }

    /// 构建表的 URL：`{api_base}/{base_id}/{table}`
    fn table_url(&self, table: &str) -> AppResult<Url> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            name: "airtable_api_base_url",
            reason,
        };

        let mut url = Url::parse(&self.api_base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("不能作为基础 URL".to_string()))?
            .pop_if_empty()
            .push(&self.base_id)
            .push(table);
        Ok(url)
    }

    /// 发送请求并解析 JSON 响应
    async fn send<T: DeserializeOwned>(&self, endpoint: &str, request: RequestBuilder) -> AppResult<T> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::store_request_failed(endpoint, e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            warn!("Airtable 请求频率限制: {}", endpoint);
            return Err(ExternalServiceError::RateLimited {
                endpoint: endpoint.to_string(),
                retry_after,
            }
            .into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Airtable 返回错误响应 ({}): {} {}", endpoint, status, body);
            return Err(ExternalServiceError::BadResponse {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            }
            .into());
        }

        response.json::<T>().await.map_err(|e| {
            ExternalServiceError::DecodeFailed {
                endpoint: endpoint.to_string(),
                source: Box::new(e),
            }
            .into()
        })
    }

    /// 翻页读取全部记录
    async fn list_all(&self, table: &str, query: &ListQuery) -> AppResult<Vec<Record>> {
        let url = self.table_url(table)?;
        let endpoint = format!("GET {}", table);
        let params = list_params(query);

        let (records, page_count) = collect_pages(|offset| {
            let mut request = self.http.get(url.clone()).query(&params);
            if let Some(offset) = &offset {
                request = request.query(&[("offset", offset)]);
            }
            let endpoint = endpoint.as_str();
            async move { self.send::<ListResponse>(endpoint, request).await }
        })
        .await?;

        debug!("读取 {}: {} 条记录, {} 页", table, records.len(), page_count);
        Ok(records)
    }

    async fn create_records(&self, table: &str, records: Vec<Fields>) -> AppResult<Vec<Record>> {
        let url = self.table_url(table)?;
        let payload: Vec<_> = records
            .into_iter()
            .map(|fields| json!({ "fields": fields }))
            .collect();
        debug!("创建 {}: {} 条记录", table, payload.len());

        let request = self.http.post(url).json(&json!({ "records": payload }));
        let response: RecordsResponse = self.send(&format!("POST {}", table), request).await?;
        Ok(response.records)
    }

    async fn update_records(&self, table: &str, updates: Vec<RecordUpdate>) -> AppResult<Vec<Record>> {
        let url = self.table_url(table)?;
        debug!("更新 {}: {} 条记录", table, updates.len());

        let request = self.http.patch(url).json(&json!({ "records": updates }));
        let response: RecordsResponse = self.send(&format!("PATCH {}", table), request).await?;
        Ok(response.records)
    }

    async fn destroy_records(&self, table: &str, ids: Vec<String>) -> AppResult<Vec<String>> {
        let url = self.table_url(table)?;
        debug!("删除 {}: {} 条记录", table, ids.len());

        let params: Vec<(&str, &str)> = ids.iter().map(|id| ("records[]", id.as_str())).collect();
        let request = self.http.delete(url).query(&params);
        let response: DeleteResponse = self.send(&format!("DELETE {}", table), request).await?;
        Ok(response.records.into_iter().map(|r| r.id).collect())
    }
}

/// 列表查询参数：分页大小、筛选公式、排序
fn list_params(query: &ListQuery) -> Vec<(String, String)> {
    let mut params = vec![("pageSize".to_string(), PAGE_SIZE.to_string())];

    if let Some(filter) = &query.filter {
        params.push(("filterByFormula".to_string(), filter.to_formula()));
    }

    for (i, sort) in query.sort.iter().enumerate() {
        params.push((format!("sort[{}][field]", i), sort.field.clone()));
        params.push((
            format!("sort[{}][direction]", i),
            sort.direction.as_str().to_string(),
        ));
    }

    params
}

impl RecordStore for AirtableClient {
    fn name(&self) -> &'static str {
        "airtable"
    }

    fn list<'a>(&'a self, table: &'a str, query: &'a ListQuery) -> BoxFuture<'a, AppResult<Vec<Record>>> {
        Box::pin(self.list_all(table, query))
    }

    fn create<'a>(&'a self, table: &'a str, records: Vec<Fields>) -> BoxFuture<'a, AppResult<Vec<Record>>> {
        Box::pin(self.create_records(table, records))
    }

    fn update<'a>(
        &'a self,
        table: &'a str,
        updates: Vec<RecordUpdate>,
    ) -> BoxFuture<'a, AppResult<Vec<Record>>> {
        Box::pin(self.update_records(table, updates))
    }

    fn destroy<'a>(&'a self, table: &'a str, ids: Vec<String>) -> BoxFuture<'a, AppResult<Vec<String>>> {
        Box::pin(self.destroy_records(table, ids))
    }
}

/// 依次请求每一页，把上一页返回的 `offset` 带给下一页，直到不再返回 `offset`
///
/// 返回全部记录（按页顺序拼接）和页数
async fn collect_pages<F, Fut>(mut fetch_page: F) -> AppResult<(Vec<Record>, usize)>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = AppResult<ListResponse>>,
{
    let mut records = Vec::new();
    let mut offset: Option<String> = None;
    let mut page_count = 0usize;

    loop {
        let page = fetch_page(offset.take()).await?;
        page_count += 1;
        records.extend(page.records);

        match page.offset {
            Some(next) => offset = Some(next),
            None => break,
        }
    }

    Ok((records, page_count))
}
