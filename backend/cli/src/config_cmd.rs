//! `sceneforge config`, `set-key` and `clear-key`.

use anyhow::{bail, Context, Result};

use sceneforge_config::{collect_redacted_paths, redact, SceneForgeConfig};
use sceneforge_core::KeyValueStore;
use sceneforge_infra::GATEWAY_API_KEY;

use crate::terminal_output::{note_info, note_success};

/// Resolved config as YAML with secrets masked.
pub fn render_config(config: &SceneForgeConfig) -> Result<String> {
    let value = serde_json::to_value(config).context("Failed to serialize config")?;
    serde_yaml::to_string(&redact(&value)).context("Failed to render config as YAML")
}

pub fn show(config: &SceneForgeConfig, credentials: &dyn KeyValueStore) -> Result<()> {
    print!("{}", render_config(config)?);

    let value = serde_json::to_value(config)?;
    let masked = collect_redacted_paths(&value);
    if !masked.is_empty() {
        note_info(&format!("Masked: {}", masked.join(", ")));
    }
    if credentials.get(GATEWAY_API_KEY)?.is_some() {
        note_info("A gateway API key is stored in the credential store");
    }
    Ok(())
}

pub fn set_key(credentials: &dyn KeyValueStore, key: &str) -> Result<()> {
    let key = key.trim();
    if key.is_empty() {
        bail!("API key must not be empty");
    }
    credentials.set(GATEWAY_API_KEY, key)?;
    note_success("Stored gateway API key");
    Ok(())
}

pub fn clear_key(credentials: &dyn KeyValueStore) -> Result<()> {
    if credentials.get(GATEWAY_API_KEY)?.is_none() {
        note_info("No gateway API key stored");
        return Ok(());
    }
    credentials.remove(GATEWAY_API_KEY)?;
    note_success("Removed gateway API key");
    Ok(())
}
