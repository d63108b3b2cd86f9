//! # 对话模型接入
//!
//! OpenAI 兼容的 `/chat/completions` 客户端，检索增强问答的生成端。

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::ChatConfig;
use crate::error::{Result, VrsError};

/// 对话模型统一接口
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 补全一轮对话，可选系统提示
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String>;

    /// 模型名（日志用）
    fn name(&self) -> &str;
}

/// OpenAI 兼容对话服务
pub struct OpenAIChatService {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
    model: String,
}

impl OpenAIChatService {
    /// 使用配置创建服务
    pub fn with_config(config: &ChatConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(VrsError::configuration(
                "Missing API key: set CHAT_API_KEY, OPENAI_API_KEY or LLM_BINDING_API_KEY",
            ));
        }
        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            model: config.model.clone(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl ChatModel for OpenAIChatService {
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.push(serde_json::json!({"role": "user", "content": prompt}));

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": messages,
            }))
            .send()
            .await
            .map_err(|e| VrsError::ai(format!("Chat API request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text: String = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(VrsError::ai(format!("Chat API error: {}", error_text)));
        }

        let result: ChatCompletionResponse = response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| VrsError::ai(format!("Failed to parse chat response: {}", e)))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| VrsError::ai("No choices in chat response"))
    }

    fn name(&self) -> &str {
        &self.model
    }
}
