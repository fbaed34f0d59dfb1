//! `sceneforge-config`: SceneForge runtime configuration.
//!
//! Provides:
//! - Typed config schema (logging, frame, script, gateway)
//! - YAML read/write with rolling backups
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Validation with path-qualified messages
//! - Redaction for safe display

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, load_raw, write_config};
pub use redact::{collect_redacted_paths, redact};
pub use schema::{FrameConfig, GatewayConfig, LoggingConfig, SceneForgeConfig, ScriptConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load a config file, substitute env vars, apply defaults and validate.
///
/// Warnings are logged. Validation errors fail the load.
pub async fn load_and_prepare(path: &Path) -> Result<SceneForgeConfig> {
    let raw = load_raw(path).await?;
    let value = resolve_env_vars(&raw).context("Failed to resolve env vars in config")?;
    prepare(value)
}

/// The part of `load_and_prepare` after the file has been read.
pub fn prepare(value: Value) -> Result<SceneForgeConfig> {
    let config: SceneForgeConfig =
        serde_json::from_value(value).context("Failed to deserialize config")?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if let Some(first) = report.errors.first() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        bail!("{} config error(s); first: {}", report.errors.len(), first);
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn substituted_values_are_strings() {
        // Env substitution only produces strings; numeric fields must be literal.
        let env: HashMap<String, String> = [("HZ".to_string(), "30".to_string())].into();
        let value = resolve_env_vars_with(&json!({"frame": {"tickHz": "${HZ}"}}), &env).unwrap();
        assert!(prepare(value).is_err());
    }

    #[test]
    fn prepare_applies_defaults_and_rejects_errors() {
        let config = prepare(json!({"gateway": {"provider": "ollama"}})).unwrap();
        assert_eq!(config.tick_hz(), 60);
        assert_eq!(config.gateway.unwrap().provider.as_deref(), Some("ollama"));

        let err = prepare(json!({"script": {"instructionLimit": 0}})).unwrap_err();
        assert!(err.to_string().contains("script.instructionLimit"));
    }
}
