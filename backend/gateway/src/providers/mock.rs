use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::llm::{LlmProvider, LlmRequest, LlmResponse};

/// Provider returning a fixed completion. Every request it sees is kept so
/// tests can inspect the prompts that were sent.
pub struct MockProvider {
    name: String,
    fixed_response: Option<String>,
    seen: Mutex<Vec<LlmRequest>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fixed_response: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.seen.lock().map(|seen| seen.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(req.clone());
        }
        let default = "function Mock()\n  return { shape = \"box\" }\nend";
        Ok(LlmResponse {
            content: self
                .fixed_response
                .clone()
                .unwrap_or_else(|| default.to_string()),
            provider: self.name.clone(),
            model: req.model.clone(),
            tokens_used: 0,
            latency_ms: 0,
        })
    }
}
