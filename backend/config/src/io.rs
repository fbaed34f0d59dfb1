//! Config file read/write with rolling backups.

use crate::schema::SceneForgeConfig;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.yaml";

const MAX_BACKUPS: usize = 5;

/// `SCENEFORGE_CONFIG_DIR` if set, otherwise `~/.sceneforge/`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SCENEFORGE_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    match dirs::home_dir() {
        Some(home) => home.join(".sceneforge"),
        None => PathBuf::from(".sceneforge"),
    }
}

pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Read the config file as an untyped tree, before env substitution.
/// A missing or empty file is an empty mapping (first run).
pub async fn load_raw(path: &Path) -> Result<Value> {
    if !path.exists() {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }

    let value: Value = serde_yaml::from_str(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;
    info!(path = %path.display(), "Loaded config");
    Ok(value)
}

/// Write config atomically (temp file, then rename), keeping up to five
/// numbered backups of the previous file.
pub async fn write_config(config: &SceneForgeConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    if path.exists() {
        rotate_backups(path).await;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;

    let tmp_path = path.with_extension("yaml.tmp");
    fs::write(&tmp_path, yaml.as_bytes())
        .await
        .with_context(|| format!("Failed to write temp config: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to rename temp config to: {}", path.display()))?;

    info!(path = %path.display(), "Wrote config");
    Ok(())
}

/// config.yaml.bak.1 -> .bak.2 -> ... ; the current file becomes .bak.1.
async fn rotate_backups(path: &Path) {
    for i in (1..MAX_BACKUPS).rev() {
        let old = path.with_extension(format!("yaml.bak.{i}"));
        let new = path.with_extension(format!("yaml.bak.{}", i + 1));
        if old.exists() {
            if let Err(e) = fs::rename(&old, &new).await {
                warn!("Failed to rotate backup {}: {}", old.display(), e);
            }
        }
    }

    let bak = path.with_extension("yaml.bak.1");
    if let Err(e) = fs::copy(path, &bak).await {
        warn!("Failed to create backup {}: {}", bak.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FrameConfig;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("sceneforge-config-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = scratch_dir();
        let raw = load_raw(&config_file_path(&dir)).await.unwrap();
        assert_eq!(raw, Value::Object(Default::default()));
    }

    #[tokio::test]
    async fn write_then_read_keeps_backups() {
        let dir = scratch_dir();
        let path = config_file_path(&dir);
        let mut config = SceneForgeConfig::default();

        for hz in [30, 45, 90] {
            config.frame = Some(FrameConfig {
                tick_hz: Some(hz),
                spawn_extent: None,
            });
            write_config(&config, &path).await.unwrap();
        }

        let raw = load_raw(&path).await.unwrap();
        assert_eq!(raw["frame"]["tickHz"], 90);
        assert!(path.with_extension("yaml.bak.1").exists());
        assert!(path.with_extension("yaml.bak.2").exists());
        assert!(!path.with_extension("yaml.tmp").exists());

        let _ = std::fs::remove_dir_all(dir);
    }
}
