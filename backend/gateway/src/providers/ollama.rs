use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{LlmProvider, LlmRequest, LlmResponse};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Local Ollama provider.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
}

impl OllamaProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
    eval_count: Option<u64>,
    prompt_eval_count: Option<u64>,
}

/// Ollama model names carry no router prefix ("openai/gpt-4o" -> "gpt-4o").
fn local_model(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

fn chat_body(request: &LlmRequest) -> OllamaChatRequest {
    let mut messages = Vec::with_capacity(2);
    if !request.system_prompt.is_empty() {
        messages.push(OllamaChatMessage {
            role: "system".to_string(),
            content: request.system_prompt.clone(),
        });
    }
    messages.push(OllamaChatMessage {
        role: "user".to_string(),
        content: request.user_prompt.clone(),
    });
    OllamaChatRequest {
        model: local_model(&request.model).to_string(),
        messages,
        stream: false,
        options: OllamaOptions {
            temperature: request.temperature,
            num_predict: request.max_tokens,
        },
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse> {
        let start = Instant::now();
        let body = chat_body(request);
        debug!(model = %body.model, "Sending request to Ollama");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Ollama HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama returned {}: {}", status, error_body);
        }

        let chat: OllamaChatResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        Ok(LlmResponse {
            content: chat.message.content,
            provider: "ollama".to_string(),
            model: body.model,
            tokens_used: chat.eval_count.unwrap_or(0) + chat.prompt_eval_count.unwrap_or(0),
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_router_prefix() {
        assert_eq!(local_model("meta-llama/llama3"), "llama3");
        assert_eq!(local_model("llama3"), "llama3");
    }

    #[test]
    fn body_is_non_streaming_with_limits() {
        let body = chat_body(&LlmRequest {
            model: "qwen2.5-coder".into(),
            system_prompt: String::new(),
            user_prompt: "spinning torus".into(),
            max_tokens: 300,
            temperature: 0.5,
        });
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 300);
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }
}
