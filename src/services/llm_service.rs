//! 对话补全 - 业务能力层
//!
//! 只负责"发一次请求、拿回一段文本"，提示词由上层的 OCR / 生成服务决定。
//! 底层走 `async-openai`，端点和模型名来自配置，任何 OpenAI 兼容服务都能接入。

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, ExternalServiceError};

/// 一次对话补全请求
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    /// 系统消息（可选）
    pub system: Option<&'a str>,
    /// 用户消息
    pub user: &'a str,
    /// 附加到用户消息的图片（data URI 或 URL）
    pub images: &'a [String],
    pub temperature: f32,
    pub max_tokens: u32,
}

impl<'a> ChatRequest<'a> {
    /// 纯文本请求，默认温度 0.3、最多 1024 个 token
    pub fn new(user: &'a str) -> Self {
        Self {
            system: None,
            user,
            images: &[],
            temperature: 0.3,
            max_tokens: 1024,
        }
    }

    pub fn system(mut self, system: &'a str) -> Self {
        self.system = Some(system);
        self
    }

    pub fn images(mut self, images: &'a [String]) -> Self {
        self.images = images;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// 对话模型
///
/// OCR、卡片生成、标题生成都基于它实现，测试时可以替换成脚本化的实现
pub trait ChatModel: Send + Sync {
    /// 模型名称（仅用于日志和错误信息）
    fn model_name(&self) -> &str;

    /// 发送一次请求，返回去掉首尾空白的回复文本
    fn complete<'a>(&'a self, request: ChatRequest<'a>) -> BoxFuture<'a, AppResult<String>>;
}

/// `ChatModel` 的 OpenAI 兼容实现，进程内只创建一个
pub struct LlmService {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmService {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        let client = Client::with_config(openai_config);

        Self {
            client,
            model_name: config.llm_model_name.clone(),
        }
    }

    /// 发送请求并返回回复文本
    ///
    /// 有图片时用户消息按 Vision 格式拆成多段：先文本，再按顺序每张图片一段
    pub async fn send_to_llm(&self, request: ChatRequest<'_>) -> AppResult<String> {
        debug!("🤖 请求模型 {} (图片 {} 张)", self.model_name, request.images.len());
        debug!("用户消息长度: {} 字符", request.user.len());

        let messages = self
            .build_messages(&request)
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build()
            .map_err(|e| AppError::llm_api_failed(&self.model_name, e))?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            warn!("⚠️ 模型 {} 调用失败: {}", self.model_name, e);
            AppError::llm_api_failed(&self.model_name, e)
        })?;

        debug!("🤖 模型 {} 已返回", self.model_name);

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| ExternalServiceError::EmptyCompletion {
                model: self.model_name.clone(),
            })?;

        Ok(content.trim().to_string())
    }

    /// 构建消息列表：可选的系统消息 + 用户消息
    fn build_messages(
        &self,
        request: &ChatRequest<'_>,
    ) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
        let mut messages = Vec::new();

        if let Some(sys_msg) = request.system {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = if request.images.is_empty() {
            ChatCompletionRequestUserMessageArgs::default()
                .content(request.user)
                .build()?
        } else {
            let mut content_parts = vec![ChatCompletionRequestUserMessageContentPart::Text(
                ChatCompletionRequestMessageContentPartText {
                    text: request.user.to_string(),
                },
            )];

            for url in request.images {
                content_parts.push(ChatCompletionRequestUserMessageContentPart::ImageUrl(
                    ChatCompletionRequestMessageContentPartImage {
                        image_url: ImageUrl {
                            url: url.clone(),
                            detail: Some(ImageDetail::Auto),
                        },
                    },
                ));
            }

            debug!("使用 Vision API，包含 {} 张图片", request.images.len());

            ChatCompletionRequestUserMessageArgs::default()
                .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                .build()?
        };

        messages.push(ChatCompletionRequestMessage::User(user_msg));
        Ok(messages)
    }
}

impl ChatModel for LlmService {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn complete<'a>(&'a self, request: ChatRequest<'a>) -> BoxFuture<'a, AppResult<String>> {
        Box::pin(self.send_to_llm(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> LlmService {
        let config = Config {
            llm_api_key: "sk-test".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            ..Default::default()
        };
        LlmService::new(&config)
    }

    #[test]
    fn test_chat_request_builder() {
        let images = vec!["data:image/png;base64,AAAA".to_string()];
        let request = ChatRequest::new("hello")
            .system("be brief")
            .images(&images)
            .temperature(0.7)
            .max_tokens(30);

        assert_eq!(request.user, "hello");
        assert_eq!(request.system, Some("be brief"));
        assert_eq!(request.images.len(), 1);
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 30);
    }

    #[test]
    fn test_build_messages_text_only() {
        let service = create_test_service();
        let messages = service
            .build_messages(&ChatRequest::new("hello").system("sys"))
            .unwrap();

        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_build_messages_with_images_uses_content_parts() {
        let service = create_test_service();
        let images = vec![
            "data:image/png;base64,AAAA".to_string(),
            "data:image/jpeg;base64,BBBB".to_string(),
        ];
        let messages = service
            .build_messages(&ChatRequest::new("extract").images(&images))
            .unwrap();

        assert_eq!(messages.len(), 1);
        match &messages[0] {
            ChatCompletionRequestMessage::User(user) => match &user.content {
                ChatCompletionRequestUserMessageContent::Array(parts) => assert_eq!(parts.len(), 3),
                other => panic!("期望多部分内容, 实际为 {:?}", other),
            },
            other => panic!("期望用户消息, 实际为 {:?}", other),
        }
    }

    /// 需要真实的 API Key：
    /// ```bash
    /// OPENAI_API_KEY=... cargo test test_live_completion -- --ignored --nocapture
    /// ```
    #[tokio::test]
    #[ignore]
    async fn test_live_completion() {
        let _ = tracing_subscriber::fmt::try_init();

        let config = Config::from_env().expect("读取环境变量失败");
        let service = LlmService::new(&config);
        let reply = service
            .complete(ChatRequest::new("Reply with the single word: ok").max_tokens(5))
            .await
            .expect("LLM 调用失败");
        println!("LLM 响应: {}", reply);
    }
}
