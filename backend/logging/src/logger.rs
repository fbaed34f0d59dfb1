//! Global subscriber setup.
//!
//! `RUST_LOG` wins over the configured level when it is set.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Console logger plus a rolling JSON file `sceneforge.log.YYYY-MM-DD` in
/// `log_dir`. Does nothing if a global subscriber is already installed.
pub fn init_logger<P: AsRef<Path>>(log_dir: P, level: &str) -> Result<()> {
    let log_dir = log_dir.as_ref();
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, "sceneforge.log");

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_appender)
        .with_ansi(false);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(true);

    let _ = tracing_subscriber::registry()
        .with(filter(level))
        .with(console_layer)
        .with(file_layer)
        .try_init();
    Ok(())
}

/// Console-only logger for short runs and tests.
pub fn init_console(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_log_directory() {
        let dir = std::env::temp_dir().join(format!("sceneforge-logs-{}", uuid::Uuid::new_v4()));
        init_logger(&dir, "warn").unwrap();
        assert!(dir.is_dir());
        let _ = std::fs::remove_dir_all(dir);
    }
}
