//! `sceneforge run`: headless session against the configured gateway.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use sceneforge_config::SceneForgeConfig;
use sceneforge_core::{CanvasObject, GenerationGateway, Provenance};
use sceneforge_logging::EventLogger;
use sceneforge_renderer::TracingSink;
use sceneforge_script::ScriptLimits;
use sceneforge_studio::{run_frames, Studio, StudioEvent, StudioOptions};

use crate::terminal_output::{note_info, note_success, print_event, render_table};

/// How many builtins `--demo` drops into the scene.
const DEMO_OBJECTS: usize = 3;

#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub frames: u64,
    pub prompts: Vec<String>,
    pub tools: Vec<ToolSpec>,
    pub demo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
}

/// Parses `NAME=DESCRIPTION`.
pub fn parse_tool_spec(raw: &str) -> Result<ToolSpec, String> {
    let Some((name, description)) = raw.split_once('=') else {
        return Err(format!("expected NAME=DESCRIPTION, got '{raw}'"));
    };
    let (name, description) = (name.trim(), description.trim());
    if name.is_empty() || description.is_empty() {
        return Err(format!("tool name and description must be non-empty in '{raw}'"));
    }
    Ok(ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
    })
}

pub fn studio_options(config: &SceneForgeConfig) -> StudioOptions {
    StudioOptions {
        tick_hz: config.tick_hz(),
        spawn_extent: config.spawn_extent(),
        limits: ScriptLimits {
            instruction_limit: config.instruction_limit(),
            memory_limit_bytes: config.memory_limit_bytes(),
        },
        ..StudioOptions::default()
    }
}

pub async fn run(
    config: &SceneForgeConfig,
    gateway: Arc<dyn GenerationGateway>,
    args: RunArgs,
) -> Result<()> {
    let session_id = Uuid::new_v4().to_string();
    info!(session_id = %session_id, gateway = gateway.name(), "[Run] Starting session");

    let mut studio =
        Studio::new(gateway, studio_options(config)).context("Failed to start the studio")?;

    if args.demo {
        for _ in 0..DEMO_OBJECTS {
            studio.add_random_builtin()?;
        }
    }
    for tool in &args.tools {
        studio.request_tool(&tool.name, &tool.description)?;
    }
    for prompt in &args.prompts {
        studio.request_object(prompt)?;
    }
    if studio.objects().is_empty() && studio.stats().pending == 0 {
        bail!("Nothing to render: pass --prompt, --tool or --demo");
    }

    let mut sink = TracingSink::default();
    let mut summary = run_frames(&mut studio, &mut sink, args.frames).await;
    let mut tool_ids = report_events(&session_id, studio.drain_events());

    if studio.stats().pending > 0 {
        note_info("Waiting for outstanding generations...");
        studio.settle().await;
        tool_ids.extend(report_events(&session_id, studio.drain_events()));
    }

    if !tool_ids.is_empty() {
        for tool_id in &tool_ids {
            match studio.execute_tool(tool_id, &json!({})) {
                Ok(result) => info!(tool_id = %tool_id, result = %result, "[Run] Tool executed"),
                Err(e) => warn!(tool_id = %tool_id, error = %e, "[Run] Tool failed"),
            }
        }
        report_events(&session_id, studio.drain_events());
    }

    // One more frame so late arrivals are mounted and drawn.
    let tail = run_frames(&mut studio, &mut sink, 1).await;
    summary.frames += tail.frames;
    summary.drawn += tail.drawn;
    summary.placeholders += tail.placeholders;
    summary.skipped += tail.skipped;
    summary.faults += tail.faults;
    report_events(&session_id, studio.drain_events());

    println!();
    let rows = object_rows(&studio.objects());
    print!("{}", render_table(&["ID", "KIND", "ORIGIN", "POSITION"], &rows));
    println!();
    println!("{}", serde_json::to_string_pretty(&json!({
        "session": session_id,
        "run": summary,
        "studio": studio.stats(),
    }))?);
    note_success(&format!("Rendered {} frames", summary.frames));
    Ok(())
}

/// Print and log each event. Returns the ids of tools created along the way.
fn report_events(session_id: &str, events: Vec<StudioEvent>) -> Vec<String> {
    let mut created = Vec::new();
    for event in events {
        EventLogger::log_event(session_id, &event);
        print_event(&event);
        if let StudioEvent::ToolCreated { tool_id, .. } = &event {
            created.push(tool_id.clone());
        }
    }
    created
}

fn object_rows(objects: &[CanvasObject]) -> Vec<Vec<String>> {
    objects
        .iter()
        .map(|object| {
            let origin = match object.provenance() {
                Provenance::Manual => "manual",
                Provenance::Synthesized => "synthesized",
                Provenance::ToolGenerated => "tool",
            };
            let [x, y, z] = object.position.to_array();
            vec![
                object.id.to_string(),
                object.kind.to_string(),
                origin.to_string(),
                format!("({x:.1}, {y:.1}, {z:.1})"),
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneforge_config::{FrameConfig, ScriptConfig};
    use sceneforge_core::{ObjectId, ObjectKind, ObjectOrigin, Position};

    #[test]
    fn parses_tool_specs() {
        assert_eq!(
            parse_tool_spec("grid = lay out cubes in a grid").unwrap(),
            ToolSpec {
                name: "grid".into(),
                description: "lay out cubes in a grid".into(),
            }
        );
        // Only the first '=' splits.
        assert_eq!(parse_tool_spec("eq=a=b").unwrap().description, "a=b");
        assert!(parse_tool_spec("no-separator").is_err());
        assert!(parse_tool_spec("=missing name").is_err());
        assert!(parse_tool_spec("name=").is_err());
    }

    #[test]
    fn options_follow_config() {
        let config = SceneForgeConfig {
            frame: Some(FrameConfig {
                tick_hz: Some(30),
                spawn_extent: Some(4.0),
            }),
            script: Some(ScriptConfig {
                instruction_limit: Some(5_000),
                memory_limit_bytes: Some(0),
            }),
            ..Default::default()
        };
        let options = studio_options(&config);
        assert_eq!(options.tick_hz, 30);
        assert_eq!(options.spawn_extent, 4.0);
        assert_eq!(options.limits.instruction_limit, 5_000);
        assert_eq!(options.limits.memory_limit_bytes, 0);
    }

    #[test]
    fn rows_show_origin_and_position() {
        let object = CanvasObject::builtin(
            ObjectId::new("obj_1"),
            ObjectKind::Cube,
            Position::new(1.0, -2.0, 0.5).unwrap(),
        )
        .with_origin(ObjectOrigin::tool_generated("tool_7"));
        let rows = object_rows(&[object]);
        assert_eq!(rows[0], vec!["obj_1", "cube", "tool", "(1.0, -2.0, 0.5)"]);
    }

    #[tokio::test]
    async fn empty_session_is_rejected() {
        let gateway = Arc::new(sceneforge_gateway::CannedGateway::demo());
        let args = RunArgs {
            frames: 1,
            ..Default::default()
        };
        let err = run(&SceneForgeConfig::default(), gateway, args).await.unwrap_err();
        assert!(err.to_string().contains("Nothing to render"));
    }
}
