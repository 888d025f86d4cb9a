use crate::error::{AppResult, ConfigError};
use crate::orchestrator::MAX_RECORDS_PER_REQUEST;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// 默认配置文件名
const DEFAULT_CONFIG_FILE: &str = "studycard.toml";

/// 数据表存储后端
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Airtable REST API
    Airtable,
    /// 进程内存储（本地开发 / 测试）
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "airtable" => Ok(StoreBackend::Airtable),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(()),
        }
    }
}

/// OCR / 生成服务后端
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiBackend {
    /// 兼容 OpenAI API 的服务
    OpenAi,
    /// 固定返回值的本地实现
    Mock,
}

impl FromStr for AiBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(AiBackend::OpenAi),
            "mock" => Ok(AiBackend::Mock),
            _ => Err(()),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP 监听地址
    pub bind_address: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 存储配置 ---
    pub store_backend: StoreBackend,
    pub airtable_api_key: String,
    pub airtable_base_id: String,
    pub airtable_api_base_url: String,
    /// 卡片表名
    pub flashcards_table: String,
    /// 上传记录表名
    pub uploads_table: String,
    /// 每次写请求的最大记录数
    pub batch_size: usize,
    // --- LLM 配置 ---
    pub ai_backend: AiBackend,
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// 没有内容描述时是否调用 LLM 生成标题
    pub generate_content_titles: bool,
    // --- 上传限制 ---
    pub max_images: usize,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
            verbose_logging: false,
            store_backend: StoreBackend::Airtable,
            airtable_api_key: String::new(),
            airtable_base_id: String::new(),
            airtable_api_base_url: "https://api.airtable.com/v0".to_string(),
            flashcards_table: "Flashcards".to_string(),
            uploads_table: "Uploads".to_string(),
            batch_size: 10,
            ai_backend: AiBackend::OpenAi,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            generate_content_titles: true,
            max_images: 10,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

impl Config {
    /// 加载配置：配置文件（可选）+ 环境变量覆盖
    ///
    /// 配置文件路径取自 `STUDYCARD_CONFIG`，未设置时尝试当前目录下的 `studycard.toml`
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var("STUDYCARD_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            Err(_) => Self::default(),
        };

        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 只读取环境变量（其余取默认值）
    pub fn from_env() -> AppResult<Self> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取配置，缺省字段取默认值
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::from_toml_str(&content, &path.display().to_string())?)
    }

    fn from_toml_str(content: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.to_string(),
            source,
        })
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env_overrides(self) -> AppResult<Self> {
        Ok(Self {
            bind_address: env_string("BIND_ADDRESS").unwrap_or(self.bind_address),
            verbose_logging: env_parsed("VERBOSE_LOGGING", "bool")?.unwrap_or(self.verbose_logging),
            store_backend: env_parsed("STORE_BACKEND", "airtable|memory")?
                .unwrap_or(self.store_backend),
            airtable_api_key: env_string("AIRTABLE_API_KEY").unwrap_or(self.airtable_api_key),
            airtable_base_id: env_string("AIRTABLE_BASE_ID").unwrap_or(self.airtable_base_id),
            airtable_api_base_url: env_string("AIRTABLE_API_BASE_URL")
                .unwrap_or(self.airtable_api_base_url),
            flashcards_table: env_string("AIRTABLE_TABLE_1_NAME").unwrap_or(self.flashcards_table),
            uploads_table: env_string("AIRTABLE_TABLE_2_NAME").unwrap_or(self.uploads_table),
            batch_size: env_parsed("BATCH_SIZE", "usize")?.unwrap_or(self.batch_size),
            ai_backend: env_parsed("AI_BACKEND", "openai|mock")?.unwrap_or(self.ai_backend),
            llm_api_key: env_string("OPENAI_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            generate_content_titles: env_parsed("GENERATE_CONTENT_TITLES", "bool")?
                .unwrap_or(self.generate_content_titles),
            max_images: env_parsed("MAX_IMAGES", "usize")?.unwrap_or(self.max_images),
            max_upload_bytes: env_parsed("MAX_UPLOAD_BYTES", "usize")?
                .unwrap_or(self.max_upload_bytes),
        })
    }

    /// 检查配置是否可用
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "batch_size",
                reason: "必须为正整数".to_string(),
            });
        }
        if self.max_images == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_images",
                reason: "必须为正整数".to_string(),
            });
        }
        if self.store_backend == StoreBackend::Airtable {
            if self.batch_size > MAX_RECORDS_PER_REQUEST {
                return Err(ConfigError::InvalidValue {
                    name: "batch_size",
                    reason: format!("Airtable 每次写请求最多 {} 条记录", MAX_RECORDS_PER_REQUEST),
                });
            }
            if self.airtable_api_key.is_empty() {
                return Err(ConfigError::MissingValue("airtable_api_key"));
            }
            if self.airtable_base_id.is_empty() {
                return Err(ConfigError::MissingValue("airtable_base_id"));
            }
        }
        if self.ai_backend == AiBackend::OpenAi && self.llm_api_key.is_empty() {
            return Err(ConfigError::MissingValue("llm_api_key"));
        }
        Ok(())
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.is_empty())
}

fn env_parsed<T: FromStr>(var_name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match env_string(var_name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: var_name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_fills_missing_fields_with_defaults() {
        let config = Config::from_toml_str(
            r#"
            store_backend = "memory"
            ai_backend = "mock"
            batch_size = 5
            "#,
            "studycard.toml",
        )
        .unwrap();

        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.ai_backend, AiBackend::Mock);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.flashcards_table, "Flashcards");
        assert_eq!(config.uploads_table, "Uploads");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let config = Config {
            batch_size: 0,
            store_backend: StoreBackend::Memory,
            ai_backend: AiBackend::Mock,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { name: "batch_size", .. })
        ));
    }

    #[test]
    fn test_validate_caps_batch_size_for_airtable() {
        let airtable = Config {
            batch_size: 11,
            airtable_api_key: "keyTest".into(),
            airtable_base_id: "appTest".into(),
            ai_backend: AiBackend::Mock,
            ..Default::default()
        };
        assert!(matches!(
            airtable.validate(),
            Err(ConfigError::InvalidValue { name: "batch_size", .. })
        ));

        let at_limit = Config { batch_size: 10, ..airtable.clone() };
        assert!(at_limit.validate().is_ok());

        // 内存存储没有单次请求上限
        let memory = Config {
            store_backend: StoreBackend::Memory,
            ..airtable
        };
        assert!(memory.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_airtable_credentials() {
        let config = Config {
            ai_backend: AiBackend::Mock,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingValue("airtable_api_key"))
        ));
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("Memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!(" openai ".parse::<AiBackend>(), Ok(AiBackend::OpenAi));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}
