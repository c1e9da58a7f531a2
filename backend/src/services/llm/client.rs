//! LLM HTTP client for OpenAI-compatible chat-completion APIs
//!
//! The assistant makes exactly two kinds of calls: relation classification
//! and intent-extraction fallback, both forced into JSON mode. Prose polish
//! for file insights reuses the same plumbing.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::models::LlmError;

/// Connection settings for one OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub api_base: String,
    pub api_key: Option<String>,
    pub model_name: String,
    pub timeout_seconds: u64,
    pub temperature: f64,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:11434/v1".to_string(),
            api_key: None,
            model_name: "qwen2.5:3b-instruct".to_string(),
            timeout_seconds: 6,
            temperature: 0.0,
        }
    }
}

pub struct LlmClient {
    http_client: Client,
    config: LlmClientConfig,
}

impl LlmClient {
    pub fn new(config: LlmClientConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .unwrap_or_else(|e| {
                tracing::error!("Failed to build LLM HTTP client: {}. Using default client.", e);
                Client::default()
            });

        Self { http_client, config }
    }

    /// Call chat completion in JSON mode and deserialize the content
    pub async fn chat_json<Resp>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<Resp, LlmError>
    where
        Resp: DeserializeOwned,
    {
        let content = self.chat_text(system_prompt, user_prompt, true).await?;
        let trimmed = strip_code_fences(&content);
        serde_json::from_str(trimmed).map_err(|e| {
            LlmError::ParseError(format!("Failed to parse LLM response: {}. Content: {}", e, content))
        })
    }

    /// Call chat completion and return raw text
    pub async fn chat_text(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        json_mode: bool,
    ) -> Result<String, LlmError> {
        let request = ChatCompletionRequest {
            model: self.config.model_name.clone(),
            messages: vec![
                ChatMessage { role: "system".to_string(), content: system_prompt.to_string() },
                ChatMessage { role: "user".to_string(), content: user_prompt.to_string() },
            ],
            temperature: Some(self.config.temperature),
            response_format: json_mode
                .then(|| ResponseFormat { r#type: "json_object".to_string() }),
        };

        let url = format!("{}/chat/completions", self.config.api_base.trim_end_matches('/'));
        tracing::debug!("Calling LLM API: {} with model {}", url, self.config.model_name);

        let mut builder = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(self.config.timeout_seconds));
        if let Some(key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder.json(&request).send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(self.config.timeout_seconds)
            } else {
                LlmError::ApiError(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError(format!("API error {}: {}", status, error_text)));
        }

        let chat_response: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::ParseError("Empty response from LLM".to_string()))
    }
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

// ============================================================================
// OpenAI API request/response types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }
}
