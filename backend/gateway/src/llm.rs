use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, error, info, warn};

use sceneforge_core::{GenerationGateway, GenerationKind, GenerationOutcome, GenerationRequest};

use crate::extract::{extract_code, find_directive};
use crate::prompts::{system_prompt, user_prompt};
use crate::providers::ProviderRegistry;

/// Trait for LLM providers behind the gateway.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openrouter", "ollama").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}

/// Generation gateway that races one or more LLM providers.
pub struct LlmGateway {
    registry: Arc<ProviderRegistry>,
    providers: Vec<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmGateway {
    pub fn new(
        registry: Arc<ProviderRegistry>,
        providers: Vec<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            providers,
            model: model.into(),
            max_tokens: 2048,
            temperature: 0.7,
        }
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Race all configured providers and return the first successful response.
    async fn race(&self, llm_request: LlmRequest) -> Result<LlmResponse> {
        let providers = self.registry.get_providers(&self.providers);
        if providers.is_empty() {
            anyhow::bail!("no LLM providers configured (wanted {:?})", self.providers);
        }

        info!(
            provider_count = providers.len(),
            model = %llm_request.model,
            "Racing LLM providers"
        );

        let start = Instant::now();
        let mut join_set = tokio::task::JoinSet::new();
        for provider in providers {
            let req = llm_request.clone();
            join_set.spawn(async move {
                let name = provider.name().to_string();
                debug!(provider = %name, "Calling provider");
                match provider.complete(&req).await {
                    Ok(response) => {
                        info!(
                            provider = %name,
                            tokens = response.tokens_used,
                            latency_ms = response.latency_ms,
                            "Provider responded"
                        );
                        Ok(response)
                    }
                    Err(e) => {
                        warn!(provider = %name, error = %e, "Provider failed");
                        Err(e)
                    }
                }
            });
        }

        // First success wins
        let mut last_error = None;
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(Ok(response)) => {
                    info!(
                        provider = %response.provider,
                        total_latency_ms = start.elapsed().as_millis() as u64,
                        "Generation completed"
                    );
                    return Ok(response);
                }
                Ok(Err(e)) => last_error = Some(e),
                Err(e) => error!(error = %e, "Provider task panicked"),
            }
        }

        match last_error {
            Some(e) => Err(e.context("all LLM providers failed")),
            None => anyhow::bail!("all LLM providers failed"),
        }
    }
}

#[async_trait]
impl GenerationGateway for LlmGateway {
    fn name(&self) -> &str {
        "llm"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        let llm_request = LlmRequest {
            model: self.model.clone(),
            system_prompt: system_prompt(request).to_string(),
            user_prompt: user_prompt(request),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let response = self.race(llm_request).await?;
        Ok(outcome_from_response(request, &response))
    }
}

/// Turn a raw completion into an outcome. Code kinds keep only the fenced
/// block; `-- entry:` and `-- features:` directives become metadata. Tool
/// source always enters through `executeTool`, so an entry directive there
/// is ignored.
pub fn outcome_from_response(
    request: &GenerationRequest,
    response: &LlmResponse,
) -> GenerationOutcome {
    let kind = request.kind;
    let text = match kind {
        GenerationKind::Object | GenerationKind::Code | GenerationKind::Ui => {
            extract_code(&response.content)
        }
        GenerationKind::SelfModify => response.content.trim().to_string(),
    };

    let mut metadata = json!({
        "kind": kind.as_str(),
        "provider": response.provider,
        "model": response.model,
        "tokensUsed": response.tokens_used,
        "latencyMs": response.latency_ms,
    });
    if let Some(entry) = find_directive(&text, "entry").filter(|_| !request.is_tool()) {
        metadata["entryPoint"] = json!(entry);
    }
    if let Some(features) = find_directive(&text, "features") {
        let tags: Vec<&str> = features
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        metadata["features"] = json!(tags);
    }
    if let Some(kind_tag) = find_directive(&text, "type") {
        metadata["type"] = json!(kind_tag);
    }

    if text.trim().is_empty() {
        let reason = format!("{} returned an empty completion", response.provider);
        return GenerationOutcome::failed(reason).with_metadata(metadata);
    }
    GenerationOutcome::ok(text).with_metadata(metadata)
}
