//! Default values applied to a freshly loaded config.

use crate::schema::{FrameConfig, GatewayConfig, LoggingConfig, SceneForgeConfig, ScriptConfig};

pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_TICK_HZ: u32 = 60;
pub const DEFAULT_SPAWN_EXTENT: f64 = 20.0;
pub const DEFAULT_INSTRUCTION_LIMIT: u32 = 1_000_000;
pub const DEFAULT_MEMORY_LIMIT_BYTES: usize = 64 * 1024 * 1024;
pub const DEFAULT_PROVIDER: &str = "demo";
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Fill every unset field. Values the user set are left alone.
pub fn apply_all_defaults(config: SceneForgeConfig) -> SceneForgeConfig {
    let config = apply_logging_defaults(config);
    let config = apply_frame_defaults(config);
    let config = apply_script_defaults(config);
    apply_gateway_defaults(config)
}

fn apply_logging_defaults(mut config: SceneForgeConfig) -> SceneForgeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.dir.get_or_insert_with(|| DEFAULT_LOG_DIR.to_string());
    config
}

fn apply_frame_defaults(mut config: SceneForgeConfig) -> SceneForgeConfig {
    let frame = config.frame.get_or_insert_with(FrameConfig::default);
    frame.tick_hz.get_or_insert(DEFAULT_TICK_HZ);
    frame.spawn_extent.get_or_insert(DEFAULT_SPAWN_EXTENT);
    config
}

fn apply_script_defaults(mut config: SceneForgeConfig) -> SceneForgeConfig {
    let script = config.script.get_or_insert_with(ScriptConfig::default);
    script.instruction_limit.get_or_insert(DEFAULT_INSTRUCTION_LIMIT);
    script.memory_limit_bytes.get_or_insert(DEFAULT_MEMORY_LIMIT_BYTES);
    config
}

/// The base URL is left unset; each provider knows its own default.
fn apply_gateway_defaults(mut config: SceneForgeConfig) -> SceneForgeConfig {
    let gateway = config.gateway.get_or_insert_with(GatewayConfig::default);
    gateway.provider.get_or_insert_with(|| DEFAULT_PROVIDER.to_string());
    gateway.model.get_or_insert_with(|| DEFAULT_MODEL.to_string());
    gateway.max_tokens.get_or_insert(DEFAULT_MAX_TOKENS);
    gateway.temperature.get_or_insert(DEFAULT_TEMPERATURE);
    config
}
