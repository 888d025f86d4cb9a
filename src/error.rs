use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 外部服务（数据表存储 / LLM）调用失败
    #[error("外部服务错误: {0}")]
    External(#[from] ExternalServiceError),
    /// 输入校验失败，发生在任何外部调用之前
    #[error("参数错误: {0}")]
    Validation(#[from] ValidationError),
    /// 存储返回的记录不符合预期结构
    #[error("记录结构错误: {0}")]
    Schema(#[from] SchemaError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 要操作的对象不存在
    #[error("未找到: {0}")]
    NotFound(String),
    /// 监听端口或服务运行失败
    #[error("服务运行失败: {0}")]
    Server(#[from] std::io::Error),
}

/// 外部服务错误
#[derive(Debug, Error)]
pub enum ExternalServiceError {
    /// 网络请求失败
    #[error("存储请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 存储返回非 2xx 响应
    #[error("存储返回错误响应 ({endpoint}): status={status}, body={body}")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// 请求频率限制
    #[error("存储请求频率限制 ({endpoint}), 建议等待: {retry_after:?}秒")]
    RateLimited {
        endpoint: String,
        retry_after: Option<u64>,
    },
    /// 响应体解析失败
    #[error("响应解析失败 ({endpoint}): {source}")]
    DecodeFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// LLM API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    LlmCallFailed {
        model: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// LLM 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyCompletion { model: String },
}

/// 参数校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 没有上传图片
    #[error("没有提供图片")]
    NoImages,
    /// 图片数量超出上限
    #[error("图片数量 {count} 超出上限 {max}")]
    TooManyImages { count: usize, max: usize },
    /// 缺少必填参数
    #[error("缺少必填参数: {0}")]
    MissingField(&'static str),
    /// 批次大小必须为正整数
    #[error("批次大小必须为正整数, 实际为 {0}")]
    InvalidChunkSize(usize),
    /// 请求体格式不正确
    #[error("请求格式错误: {0}")]
    Malformed(String),
}

/// 记录结构错误
#[derive(Debug, Error)]
pub enum SchemaError {
    /// 必填字段缺失
    #[error("记录 {record_id} 缺少字段 `{field}`")]
    MissingField { record_id: String, field: &'static str },
    /// 字段类型不符
    #[error("记录 {record_id} 的字段 `{field}` 类型错误, 期望 {expected}")]
    WrongType {
        record_id: String,
        field: &'static str,
        expected: &'static str,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 必填配置缺失
    #[error("配置项 {0} 不能为空")]
    MissingValue(&'static str),
    /// 配置项取值不合法
    #[error("配置项 {name} 取值不合法: {reason}")]
    InvalidValue { name: &'static str, reason: String },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建存储请求失败错误
    pub fn store_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::External(ExternalServiceError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建 LLM API 调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::External(ExternalServiceError::LlmCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 是否属于外部服务错误
    pub fn is_external(&self) -> bool {
        matches!(self, AppError::External(_))
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
