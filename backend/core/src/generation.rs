use std::fmt;

use serde::{Deserialize, Serialize};

/// What the generation service is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationKind {
    /// A scene object behavior (zero-argument factory).
    Object,
    /// A revision of existing behavior source.
    Code,
    /// A presentation panel.
    Ui,
    /// A review of the runtime's own capabilities.
    SelfModify,
}

impl GenerationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationKind::Object => "object",
            GenerationKind::Code => "code",
            GenerationKind::Ui => "ui",
            GenerationKind::SelfModify => "self-modify",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the generated behavior will be bound to. Object-kind requests are
/// used for both scene objects and tools; the target tells the gateway which
/// calling convention to ask for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationTarget {
    /// Zero-argument factory returning a mesh table.
    #[default]
    Object,
    /// `executeTool(context, parameters)`.
    Tool,
}

/// Request sent to a `GenerationGateway`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub kind: GenerationKind,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_source: Option<String>,
    #[serde(default)]
    pub target: GenerationTarget,
}

impl GenerationRequest {
    pub fn new(kind: GenerationKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            current_source: None,
            target: GenerationTarget::Object,
        }
    }

    /// Object-kind request for tool source.
    pub fn tool(prompt: impl Into<String>) -> Self {
        Self {
            target: GenerationTarget::Tool,
            ..Self::new(GenerationKind::Object, prompt)
        }
    }

    pub fn is_tool(&self) -> bool {
        self.target == GenerationTarget::Tool
    }

    pub fn with_current_source(mut self, source: impl Into<String>) -> Self {
        self.current_source = Some(source.into());
        self
    }
}

/// Response from a `GenerationGateway`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationOutcome {
    pub fn ok(source: impl Into<String>) -> Self {
        Self {
            success: true,
            source: Some(source.into()),
            metadata: None,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            source: None,
            metadata: None,
            error: Some(error.into()),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The source text, if this outcome can be used at all. A successful
    /// outcome with blank text is treated exactly like a failure.
    pub fn usable_source(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        self.source.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Human-readable reason this outcome is unusable.
    pub fn failure_reason(&self) -> String {
        match (&self.error, self.success) {
            (Some(e), _) => e.clone(),
            (None, true) => "generation returned no source text".to_string(),
            (None, false) => "generation reported failure".to_string(),
        }
    }

    /// String metadata field, if present.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    /// Entry-point name declared by the generator.
    pub fn entry_point_hint(&self) -> Option<&str> {
        self.metadata_str("entryPoint").filter(|s| !s.trim().is_empty())
    }

    /// Feature tags from the `features` metadata array.
    pub fn feature_tags(&self) -> Vec<String> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("features"))
            .and_then(|f| f.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_success_is_unusable() {
        assert!(GenerationOutcome::ok("   \n").usable_source().is_none());
        assert!(GenerationOutcome::failed("boom").usable_source().is_none());
        assert_eq!(GenerationOutcome::ok("x").usable_source(), Some("x"));
    }

    #[test]
    fn failure_with_text_is_still_unusable() {
        let outcome = GenerationOutcome {
            success: false,
            source: Some("function A() end".into()),
            ..Default::default()
        };
        assert!(outcome.usable_source().is_none());
    }

    #[test]
    fn metadata_helpers() {
        let outcome = GenerationOutcome::ok("x").with_metadata(json!({
            "type": "animated_cube",
            "features": ["animation", "floating", 3]
        }));
        assert_eq!(outcome.metadata_str("type"), Some("animated_cube"));
        assert_eq!(outcome.feature_tags(), vec!["animation", "floating"]);
    }

    #[test]
    fn request_serializes_with_kebab_kind() {
        let req = GenerationRequest::new(GenerationKind::SelfModify, "improve");
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["kind"], "self-modify");
        assert!(v.get("currentSource").is_none());
        assert_eq!(v["target"], "object");
    }

    #[test]
    fn tool_requests_carry_their_target() {
        let req = GenerationRequest::tool("make a grid");
        assert_eq!(req.kind, GenerationKind::Object);
        assert!(req.is_tool());
        assert_eq!(serde_json::to_value(&req).unwrap()["target"], "tool");

        let legacy: GenerationRequest =
            serde_json::from_value(json!({"kind": "object", "prompt": "cube"})).unwrap();
        assert_eq!(legacy.target, GenerationTarget::Object);
    }
}
