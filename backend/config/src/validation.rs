//! Config validation with path-qualified errors and warnings.

use crate::schema::SceneForgeConfig;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

pub const KNOWN_PROVIDERS: &[&str] = &["openrouter", "ollama", "demo"];

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate(config: &SceneForgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_logging(config, &mut report);
    validate_frame(config, &mut report);
    validate_script(config, &mut report);
    validate_gateway(config, &mut report);
    report
}

fn validate_logging(config: &SceneForgeConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            report.error("logging.level", format!("Unknown log level '{level}'"));
        }
    }
}

fn validate_frame(config: &SceneForgeConfig, report: &mut ValidationReport) {
    let Some(frame) = &config.frame else { return };
    match frame.tick_hz {
        Some(0) => report.error("frame.tickHz", "tickHz must be >= 1"),
        Some(hz) if hz > 240 => report.warn(
            "frame.tickHz",
            format!("{hz} Hz is above any display refresh rate"),
        ),
        _ => {}
    }
    if let Some(extent) = frame.spawn_extent {
        if !extent.is_finite() || extent < 0.0 {
            report.error("frame.spawnExtent", "spawnExtent must be a finite, non-negative number");
        }
    }
}

fn validate_script(config: &SceneForgeConfig, report: &mut ValidationReport) {
    let Some(script) = &config.script else { return };
    if script.instruction_limit == Some(0) {
        report.error("script.instructionLimit", "instructionLimit must be >= 1");
    }
    match script.memory_limit_bytes {
        Some(0) => report.warn("script.memoryLimitBytes", "Behavior memory is unbounded"),
        Some(bytes) if bytes < 1024 * 1024 => report.warn(
            "script.memoryLimitBytes",
            format!("{bytes} bytes is too small for most behaviors"),
        ),
        _ => {}
    }
}

fn validate_gateway(config: &SceneForgeConfig, report: &mut ValidationReport) {
    let Some(gateway) = &config.gateway else { return };
    if let Some(provider) = &gateway.provider {
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            report.error(
                "gateway.provider",
                format!("Unknown provider '{provider}'. Use 'openrouter', 'ollama' or 'demo'"),
            );
        }
        if provider == "openrouter" && gateway.api_key.as_deref().map_or(true, str::is_empty) {
            report.warn(
                "gateway.apiKey",
                "No API key in config; the stored credential will be used if present",
            );
        }
    }
    if let Some(url) = &gateway.base_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            report.error("gateway.baseUrl", "baseUrl must start with http:// or https://");
        }
    }
    if gateway.max_tokens == Some(0) {
        report.error("gateway.maxTokens", "maxTokens must be >= 1");
    }
    if let Some(t) = gateway.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("gateway.temperature", "temperature must be between 0 and 2");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{FrameConfig, GatewayConfig};

    #[test]
    fn defaults_are_valid() {
        let report = validate(&apply_all_defaults(SceneForgeConfig::default()));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn zero_tick_rate_is_an_error() {
        let cfg = SceneForgeConfig {
            frame: Some(FrameConfig {
                tick_hz: Some(0),
                spawn_extent: Some(f64::NAN),
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        let paths: Vec<&str> = report.errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["frame.tickHz", "frame.spawnExtent"]);
    }

    #[test]
    fn openrouter_without_key_warns() {
        let cfg = SceneForgeConfig {
            gateway: Some(GatewayConfig {
                provider: Some("openrouter".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "gateway.apiKey");
    }

    #[test]
    fn unknown_provider_is_an_error() {
        let cfg = SceneForgeConfig {
            gateway: Some(GatewayConfig {
                provider: Some("carrier-pigeon".into()),
                temperature: Some(3.5),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(validate(&cfg).errors.len(), 2);
    }
}
