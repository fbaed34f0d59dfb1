use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{LlmProvider, LlmRequest, LlmResponse};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// OpenRouter-compatible chat completions provider. Any endpoint speaking
/// the OpenAI `/chat/completions` dialect works with `with_base_url`.
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenRouterProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: Option<u64>,
}

fn chat_body(request: &LlmRequest) -> ChatRequest {
    let mut messages = Vec::with_capacity(2);
    if !request.system_prompt.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: request.system_prompt.clone(),
        });
    }
    messages.push(ChatMessage {
        role: "user".to_string(),
        content: request.user_prompt.clone(),
    });
    ChatRequest {
        model: request.model.clone(),
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

fn first_choice(response: ChatResponse) -> Result<(String, u64)> {
    let tokens = response.usage.and_then(|u| u.total_tokens).unwrap_or(0);
    let content = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .context("OpenRouter response had no choices")?;
    Ok((content, tokens))
}

#[async_trait]
impl LlmProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();
        debug!(model = %request.model, base_url = %self.base_url, "Sending request to OpenRouter");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("X-Title", "SceneForge")
            .json(&chat_body(request))
            .send()
            .await
            .context("OpenRouter HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenRouter returned {}: {}", status, error_body);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse OpenRouter response")?;
        let (content, tokens_used) = first_choice(parsed)?;

        Ok(LlmResponse {
            content,
            provider: "openrouter".to_string(),
            model: request.model.clone(),
            tokens_used,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(system: &str) -> LlmRequest {
        LlmRequest {
            model: "openai/gpt-4o-mini".into(),
            system_prompt: system.into(),
            user_prompt: "a red cube".into(),
            max_tokens: 512,
            temperature: 0.2,
        }
    }

    #[test]
    fn body_skips_empty_system_prompt() {
        assert_eq!(chat_body(&request("")).messages.len(), 1);
        let body = chat_body(&request("You write Lua."));
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[1].content, "a red cube");
    }

    #[test]
    fn parses_first_choice_and_usage() {
        let raw = r#"{
            "choices": [{ "message": { "role": "assistant", "content": "function A() end" } }],
            "usage": { "total_tokens": 42 }
        }"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(first_choice(parsed).unwrap(), ("function A() end".to_string(), 42));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(first_choice(empty).is_err());
    }

    #[test]
    fn base_url_is_normalized() {
        let provider = OpenRouterProvider::new("k").with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }
}
