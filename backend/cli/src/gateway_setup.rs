//! Builds the generation gateway the config asks for.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use sceneforge_config::SceneForgeConfig;
use sceneforge_core::{GenerationGateway, KeyValueStore};
use sceneforge_gateway::providers::ollama::OllamaProvider;
use sceneforge_gateway::providers::openrouter::OpenRouterProvider;
use sceneforge_gateway::{CannedGateway, LlmGateway, ProviderRegistry};
use sceneforge_infra::GATEWAY_API_KEY;

/// `offline` forces the canned demo gateway. An OpenRouter setup without a
/// key falls back to it with a warning.
pub fn build_gateway(
    config: &SceneForgeConfig,
    credentials: &dyn KeyValueStore,
    offline: bool,
) -> Result<Arc<dyn GenerationGateway>> {
    let gateway = config.gateway.clone().unwrap_or_default();
    let provider = gateway.provider.as_deref().unwrap_or("demo");

    if offline || provider == "demo" {
        info!("[Gateway] Using offline demo gateway");
        return Ok(Arc::new(CannedGateway::demo()));
    }

    let model = gateway
        .model
        .clone()
        .unwrap_or_else(|| "openai/gpt-4o-mini".to_string());
    let mut registry = ProviderRegistry::new();

    match provider {
        "openrouter" => {
            let key = match gateway.api_key.clone().filter(|k| !k.trim().is_empty()) {
                Some(key) => Some(key),
                None => credentials
                    .get(GATEWAY_API_KEY)
                    .context("Failed to read stored API key")?,
            };
            let Some(key) = key else {
                warn!("[Gateway] No OpenRouter API key configured; falling back to demo gateway");
                return Ok(Arc::new(CannedGateway::demo()));
            };
            let mut openrouter = OpenRouterProvider::new(key);
            if let Some(url) = &gateway.base_url {
                openrouter = openrouter.with_base_url(url.clone());
            }
            registry.register("openrouter", Arc::new(openrouter));
        }
        "ollama" => {
            let mut ollama = OllamaProvider::new();
            if let Some(url) = &gateway.base_url {
                ollama = ollama.with_base_url(url.clone());
            }
            registry.register("ollama", Arc::new(ollama));
        }
        other => bail!("Unknown gateway provider '{other}'"),
    }

    info!(provider, model = %model, "[Gateway] Using LLM gateway");
    let llm = LlmGateway::new(Arc::new(registry), vec![provider.to_string()], model).with_limits(
        gateway.max_tokens.unwrap_or(2048),
        gateway.temperature.unwrap_or(0.7),
    );
    Ok(Arc::new(llm))
}
