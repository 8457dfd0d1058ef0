//! OpenAI 兼容提供商实现

use async_trait::async_trait;
use hybridrag_core::{HybridRagError, Message, Result};
use reqwest::{Response, StatusCode};
use std::time::Duration;

use crate::providers::{AIProvider, ProviderConfig};
use crate::types::{
    ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse, FinishReason, TokenUsage,
};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI 提供商
pub struct OpenAIProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| HybridRagError::Config(format!("创建 HTTP 客户端失败: {}", e)))?;
        Ok(Self { config, client })
    }

    fn get_base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.config.api_key.as_deref().unwrap_or(""))
    }

    fn convert_messages(messages: &[Message]) -> Vec<serde_json::Value> {
        messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": m.role.as_str(),
                    "content": m.text_content(),
                })
            })
            .collect()
    }

    /// Maps a non-success response to an error. Throttling is kept distinct so
    /// callers can decide whether to back off.
    async fn check_status(response: Response, what: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        Err(Self::map_status(status, what, &error_text))
    }

    fn map_status(status: StatusCode, what: &str, body: &str) -> HybridRagError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            HybridRagError::Throttled(format!("{} ({}): {}", what, status, body))
        } else {
            HybridRagError::AIProvider(format!("{} 错误 ({}): {}", what, status, body))
        }
    }

    fn send_error(e: reqwest::Error, what: &str) -> HybridRagError {
        if e.is_timeout() {
            HybridRagError::Timeout(format!("{} 请求超时: {}", what, e))
        } else {
            HybridRagError::Http(format!("{} 请求失败: {}", what, e))
        }
    }

    pub(crate) fn parse_chat_response(json: &serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or_else(|| HybridRagError::AIProvider("响应中缺少 choices".to_string()))?;
        let content = choice["message"]["content"].as_str().unwrap_or("");

        Ok(ChatResponse {
            id: json["id"].as_str().unwrap_or("").to_string(),
            model: json["model"].as_str().unwrap_or("").to_string(),
            message: Message::assistant(content),
            usage: TokenUsage::new(
                json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize,
                json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as usize,
            ),
            finish_reason: FinishReason::parse(choice["finish_reason"].as_str()),
        })
    }

    pub(crate) fn parse_embedding_response(
        json: &serde_json::Value,
        expected: usize,
    ) -> Result<EmbeddingResponse> {
        let data = json["data"]
            .as_array()
            .ok_or_else(|| HybridRagError::Embedding("响应中缺少 data".to_string()))?;

        let mut indexed: Vec<(usize, Vec<f32>)> = data
            .iter()
            .enumerate()
            .map(|(pos, item)| {
                let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
                let embedding = item["embedding"]
                    .as_array()
                    .map(|arr| arr.iter().filter_map(|v| v.as_f64()).map(|v| v as f32).collect())
                    .unwrap_or_default();
                (index, embedding)
            })
            .collect();
        indexed.sort_by_key(|(index, _)| *index);

        if indexed.len() != expected {
            return Err(HybridRagError::Embedding(format!(
                "expected {} embeddings, provider returned {}",
                expected,
                indexed.len()
            )));
        }

        Ok(EmbeddingResponse {
            embeddings: indexed.into_iter().map(|(_, e)| e).collect(),
            model: json["model"].as_str().unwrap_or("").to_string(),
            usage: TokenUsage::new(json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as usize, 0),
        })
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat/completions", self.get_base_url());

        let body = serde_json::json!({
            "model": request.model,
            "messages": Self::convert_messages(&request.messages),
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "stream": false
        });

        tracing::debug!("Chat request to {} with model {}", url, request.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::send_error(e, "Chat API"))?;
        let response = Self::check_status(response, "Chat API").await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HybridRagError::AIProvider(format!("解析响应失败: {}", e)))?;

        Self::parse_chat_response(&json)
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse> {
        if request.input.is_empty() {
            return Ok(EmbeddingResponse {
                embeddings: Vec::new(),
                model: request.model,
                usage: TokenUsage::default(),
            });
        }

        let url = format!("{}/embeddings", self.get_base_url());
        let expected = request.input.len();

        let body = serde_json::json!({
            "model": request.model,
            "input": request.input
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", self.bearer())
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::send_error(e, "Embedding API"))?;
        let response = Self::check_status(response, "Embedding API").await?;

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| HybridRagError::Embedding(format!("解析响应失败: {}", e)))?;

        Self::parse_embedding_response(&json, expected)
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/models", self.get_base_url());

        let response = self
            .client
            .get(&url)
            .header("Authorization", self.bearer())
            .send()
            .await;

        Ok(response.map(|r| r.status().is_success()).unwrap_or(false))
    }
}
