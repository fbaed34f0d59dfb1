use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use sceneforge_core::{GenerationGateway, GenerationKind, GenerationOutcome, GenerationRequest};

const IMPROVEMENTS: [&str; 4] = [
    "Optimize rendering performance",
    "Add new object types",
    "Improve user interface",
    "Enhance AI capabilities",
];

enum Mode {
    Demo,
    Scripted(Mutex<VecDeque<GenerationOutcome>>),
    Failing(String),
    Unreachable(String),
}

/// Offline gateway. `demo()` answers every kind with a fixed behavior,
/// `scripted` replays outcomes in order, `failing` and `unreachable` report
/// a generation failure or a transport error respectively.
pub struct CannedGateway {
    mode: Mode,
    latency: Duration,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl CannedGateway {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            latency: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn demo() -> Self {
        Self::with_mode(Mode::Demo)
    }

    pub fn scripted(outcomes: Vec<GenerationOutcome>) -> Self {
        Self::with_mode(Mode::Scripted(Mutex::new(outcomes.into())))
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_mode(Mode::Failing(reason.into()))
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::with_mode(Mode::Unreachable(reason.into()))
    }

    /// Simulated round-trip time before each answer.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn next_scripted(queue: &Mutex<VecDeque<GenerationOutcome>>) -> Result<GenerationOutcome> {
        let mut queue = queue
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted gateway lock poisoned"))?;
        queue
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted gateway has no outcomes left"))
    }
}

#[async_trait]
impl GenerationGateway for CannedGateway {
    fn name(&self) -> &str {
        match self.mode {
            Mode::Demo => "demo",
            Mode::Scripted(_) => "scripted",
            Mode::Failing(_) | Mode::Unreachable(_) => "failing",
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        debug!(gateway = self.name(), kind = %request.kind, "Canned generation");

        match &self.mode {
            Mode::Demo => Ok(demo_outcome(request)),
            Mode::Scripted(queue) => Self::next_scripted(queue),
            Mode::Failing(reason) => Ok(GenerationOutcome::failed(reason.clone())),
            Mode::Unreachable(reason) => anyhow::bail!("{reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Demo outcomes
// ---------------------------------------------------------------------------

fn random_color() -> String {
    let bytes = Uuid::new_v4();
    let b = bytes.as_bytes();
    format!("#{:02x}{:02x}{:02x}", b[0], b[1], b[2])
}

fn demo_outcome(request: &GenerationRequest) -> GenerationOutcome {
    let generated_at = Utc::now().to_rfc3339();
    match request.kind {
        GenerationKind::Object if request.is_tool() => {
            GenerationOutcome::ok(DEMO_TOOL).with_metadata(json!({
                "type": "tool",
                "entryPoint": "executeTool",
                "generatedAt": generated_at,
            }))
        }
        GenerationKind::Object => {
            info!(prompt = %request.prompt, "Demo gateway answering with animated cube");
            GenerationOutcome::ok(demo_cube(&random_color())).with_metadata(json!({
                "type": "animated_cube",
                "complexity": "medium",
                "features": ["animation", "random_color", "floating"],
                "entryPoint": "AnimatedCube",
                "prompt": request.prompt,
                "generatedAt": generated_at,
            }))
        }
        GenerationKind::Code => match request.current_source.as_deref() {
            Some(source) if !source.trim().is_empty() => GenerationOutcome::ok(format!(
                "{}\n-- Modified: {}\n",
                source.trim_end(),
                request.prompt.trim()
            ))
            .with_metadata(json!({
                "modification": request.prompt,
                "generatedAt": generated_at,
            })),
            _ => GenerationOutcome::failed("no current source to modify"),
        },
        GenerationKind::Ui => GenerationOutcome::ok(format!(
            "Generated UI\n{}\nstatus: ready",
            request.prompt.trim()
        ))
        .with_metadata(json!({
            "component": "GeneratedUI",
            "type": "functional_component",
            "generatedAt": generated_at,
        })),
        GenerationKind::SelfModify => {
            let listing: Vec<String> = IMPROVEMENTS.iter().map(|i| format!("- {i}")).collect();
            GenerationOutcome::ok(listing.join("\n")).with_metadata(json!({
                "improvements": IMPROVEMENTS,
                "confidence": 0.85,
                "generatedAt": generated_at,
            }))
        }
    }
}

fn demo_cube(color: &str) -> String {
    format!(
        r#"-- entry: AnimatedCube
-- features: animation, random_color, floating
function AnimatedCube()
  local mesh = {{ shape = "box", size = 1, color = "{color}", metalness = 0.3, roughness = 0.4 }}
  useFrame(function(m, elapsed, delta)
    m.rotation.x = m.rotation.x + delta * 0.5
    m.rotation.y = m.rotation.y + delta
    m.position.y = math.sin(elapsed * 2) * 0.5
  end)
  return mesh
end
"#
    )
}

const DEMO_TOOL: &str = r##"function executeTool(context, parameters)
  local count = 1
  if parameters and parameters.count then
    count = parameters.count
  end
  local created = 0
  for i = 1, count do
    local id, err = context.addObject({
      kind = "cube",
      position = { x = i * 2, y = 0, z = 0 },
      color = "#33ff99",
    })
    if not id then
      error(err)
    end
    created = created + 1
  end
  return { success = true, created = created }
end
"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_object_is_an_animated_cube() {
        let gateway = CannedGateway::demo();
        let outcome = gateway
            .generate(&GenerationRequest::new(GenerationKind::Object, "a floating cube"))
            .await
            .unwrap();
        let source = outcome.usable_source().unwrap();
        assert!(source.contains("function AnimatedCube()"));
        assert!(source.contains("useFrame"));
        assert_eq!(outcome.entry_point_hint(), Some("AnimatedCube"));
        assert_eq!(outcome.feature_tags(), vec!["animation", "random_color", "floating"]);
        assert_eq!(outcome.metadata_str("type"), Some("animated_cube"));
    }

    #[test]
    fn random_colors_are_hex() {
        let color = random_color();
        assert_eq!(color.len(), 7);
        assert!(color.starts_with('#'));
        assert!(color[1..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn demo_tool_for_tool_requests() {
        let gateway = CannedGateway::demo();
        let outcome = gateway
            .generate(&GenerationRequest::tool("Create a tool named \"Stack\""))
            .await
            .unwrap();
        assert!(outcome.usable_source().unwrap().starts_with("function executeTool"));
        assert_eq!(outcome.entry_point_hint(), Some("executeTool"));
    }

    #[tokio::test]
    async fn demo_revision_appends_marker() {
        let gateway = CannedGateway::demo();
        let request = GenerationRequest::new(GenerationKind::Code, "make it red")
            .with_current_source("function A() return {} end\n");
        let outcome = gateway.generate(&request).await.unwrap();
        assert_eq!(
            outcome.usable_source(),
            Some("function A() return {} end\n-- Modified: make it red\n")
        );

        let bare = GenerationRequest::new(GenerationKind::Code, "make it red");
        assert!(!gateway.generate(&bare).await.unwrap().success);
    }

    #[tokio::test]
    async fn demo_self_review_reports_improvements() {
        let outcome = CannedGateway::demo()
            .generate(&GenerationRequest::new(GenerationKind::SelfModify, "review"))
            .await
            .unwrap();
        let metadata = outcome.metadata.unwrap();
        assert_eq!(metadata["improvements"].as_array().unwrap().len(), 4);
        assert_eq!(metadata["confidence"], 0.85);
    }

    #[tokio::test]
    async fn scripted_replays_then_errors() {
        let gateway = CannedGateway::scripted(vec![
            GenerationOutcome::ok("function A() return {} end"),
            GenerationOutcome::failed("quota"),
        ]);
        let request = GenerationRequest::new(GenerationKind::Object, "x");
        assert!(gateway.generate(&request).await.unwrap().success);
        assert_eq!(gateway.generate(&request).await.unwrap().error.as_deref(), Some("quota"));
        assert!(gateway.generate(&request).await.is_err());
        assert_eq!(gateway.requests().len(), 3);
    }

    #[tokio::test]
    async fn failing_and_unreachable() {
        let request = GenerationRequest::new(GenerationKind::Object, "x");
        let outcome = CannedGateway::failing("model refused").generate(&request).await.unwrap();
        assert!(outcome.usable_source().is_none());
        assert_eq!(outcome.failure_reason(), "model refused");

        let err = CannedGateway::unreachable("dns failure").generate(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "dns failure");
    }
}
