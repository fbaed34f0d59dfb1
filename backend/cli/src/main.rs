mod config_cmd;
mod gateway_setup;
mod run_cmd;
mod terminal_output;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use sceneforge_config::{config_dir, config_file_path, load_and_prepare, validate, SceneForgeConfig};
use sceneforge_infra::JsonFileStore;
use sceneforge_logging::{init_console, init_logger};

use run_cmd::{parse_tool_spec, RunArgs, ToolSpec};

#[derive(Parser)]
#[command(name = "sceneforge")]
#[command(about = "SceneForge: generated 3D scene behaviors, headless")]
#[command(version)]
struct Cli {
    /// Config directory (defaults to $SCENEFORGE_CONFIG_DIR or ~/.sceneforge)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate objects and tools, then tick the scene
    Run {
        /// Number of frames to render
        #[arg(short, long, default_value_t = 120)]
        frames: u64,

        /// Object prompt (repeatable)
        #[arg(short, long = "prompt")]
        prompts: Vec<String>,

        /// Tool to generate, as NAME=DESCRIPTION (repeatable)
        #[arg(short, long = "tool", value_parser = parse_tool_spec)]
        tools: Vec<ToolSpec>,

        /// Seed the scene with a few builtin objects
        #[arg(long)]
        demo: bool,

        /// Use the canned gateway regardless of config
        #[arg(long)]
        offline: bool,
    },
    /// Print the resolved config with secrets masked
    Config,
    /// Store the gateway API key
    SetKey {
        key: String,
    },
    /// Remove the stored gateway API key
    ClearKey,
}

/// Relative log dirs live under the config dir.
fn log_dir(config: &SceneForgeConfig, config_dir: &Path) -> PathBuf {
    let dir = config
        .logging
        .as_ref()
        .and_then(|l| l.dir.as_deref())
        .unwrap_or(sceneforge_config::defaults::DEFAULT_LOG_DIR);
    let dir = PathBuf::from(dir);
    if dir.is_absolute() {
        dir
    } else {
        config_dir.join(dir)
    }
}

/// Loading happens before a subscriber exists, so warnings are re-reported.
fn report_config_warnings(config: &SceneForgeConfig) {
    for warning in validate(config).warnings {
        warn!(path = %warning.path, "{}", warning.message);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dir = cli.config_dir.clone().unwrap_or_else(config_dir);

    let config = match load_and_prepare(&config_file_path(&dir)).await {
        Ok(config) => config,
        Err(e) => {
            init_console("info");
            error!("{e:#}");
            return Err(e);
        }
    };
    let credentials = JsonFileStore::in_dir(&dir);

    match cli.command {
        Commands::Run {
            frames,
            prompts,
            tools,
            demo,
            offline,
        } => {
            init_logger(log_dir(&config, &dir), config.log_level())?;
            report_config_warnings(&config);
            info!(config_dir = %dir.display(), "[SceneForge] Starting");
            let gateway = gateway_setup::build_gateway(&config, &credentials, offline)?;
            let args = RunArgs {
                frames,
                prompts,
                tools,
                demo,
            };
            if let Err(e) = run_cmd::run(&config, gateway, args).await {
                terminal_output::note_error(&format!("{e:#}"));
                return Err(e);
            }
        }
        Commands::Config => {
            init_console(config.log_level());
            report_config_warnings(&config);
            config_cmd::show(&config, &credentials)?;
        }
        Commands::SetKey { key } => {
            init_console(config.log_level());
            config_cmd::set_key(&credentials, &key)?;
        }
        Commands::ClearKey => {
            init_console(config.log_level());
            config_cmd::clear_key(&credentials)?;
        }
    }

    Ok(())
}
