//! SceneForge configuration schema.
//!
//! Every section and field is optional on disk; `defaults::apply_all_defaults`
//! fills in what the file leaves out.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneForgeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    /// Frame cadence and object placement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<FrameConfig>,

    /// Behavior interpreter limits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptConfig>,

    /// Generation service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Directory for the rolling JSON log. Relative paths are resolved
    /// against the config directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_hz: Option<u32>,

    /// Side of the spawn cube centred on the origin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawn_extent: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptConfig {
    /// VM instructions allowed per behavior invocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_limit: Option<u32>,

    /// VM memory ceiling in bytes; 0 disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// "openrouter" | "ollama" | "demo"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Usually `${OPENROUTER_API_KEY}` or left out in favour of the
    /// credential store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl SceneForgeConfig {
    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or(crate::defaults::DEFAULT_LOG_LEVEL)
    }

    pub fn tick_hz(&self) -> u32 {
        self.frame
            .as_ref()
            .and_then(|f| f.tick_hz)
            .unwrap_or(crate::defaults::DEFAULT_TICK_HZ)
    }

    pub fn spawn_extent(&self) -> f64 {
        self.frame
            .as_ref()
            .and_then(|f| f.spawn_extent)
            .unwrap_or(crate::defaults::DEFAULT_SPAWN_EXTENT)
    }

    pub fn instruction_limit(&self) -> u32 {
        self.script
            .as_ref()
            .and_then(|s| s.instruction_limit)
            .unwrap_or(crate::defaults::DEFAULT_INSTRUCTION_LIMIT)
    }

    pub fn memory_limit_bytes(&self) -> usize {
        self.script
            .as_ref()
            .and_then(|s| s.memory_limit_bytes)
            .unwrap_or(crate::defaults::DEFAULT_MEMORY_LIMIT_BYTES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = "frame:\n  tickHz: 30\n  spawnExtent: 8\n\
                    gateway:\n  provider: ollama\n  baseUrl: http://gpu-box:11434\n";
        let config: SceneForgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.tick_hz(), 30);
        assert_eq!(config.spawn_extent(), 8.0);
        let gateway = config.gateway.unwrap();
        assert_eq!(gateway.provider.as_deref(), Some("ollama"));
        assert_eq!(gateway.base_url.as_deref(), Some("http://gpu-box:11434"));
    }

    #[test]
    fn accessors_fall_back_to_defaults() {
        let config = SceneForgeConfig::default();
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.tick_hz(), 60);
        assert_eq!(config.instruction_limit(), 1_000_000);
    }
}
