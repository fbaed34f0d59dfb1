//! Tool registry: named, reusable generated behaviors invoked on demand.
//!
//! Tools are immutable once registered. `derive_tool` produces a new record
//! rather than editing one in place.

use std::rc::Rc;

use sceneforge_core::{
    CapabilityContext, GenerationGateway, GenerationOutcome, GenerationRequest, Tool,
};
use sceneforge_script::BehaviorCompiler;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::ToolError;
use crate::prompt::tool_prompt;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    compiler: BehaviorCompiler,
}

impl ToolRegistry {
    pub fn new(compiler: BehaviorCompiler) -> Self {
        Self {
            tools: Vec::new(),
            compiler,
        }
    }

    /// Ask the gateway for tool source and register the result.
    pub async fn create_tool(
        &mut self,
        name: &str,
        description: &str,
        gateway: &dyn GenerationGateway,
    ) -> Result<Tool, ToolError> {
        info!("[ToolRegistry] Creating tool {}: {}", name, description);
        let request = GenerationRequest::tool(tool_prompt(name, description));
        let outcome = gateway
            .generate(&request)
            .await
            .map_err(|e| ToolError::Generation(e.to_string()))?;
        self.register_generated(name, description, &outcome)
    }

    /// Register a tool from an outcome that has already arrived. Nothing is
    /// inserted when the outcome is unusable.
    pub fn register_generated(
        &mut self,
        name: &str,
        description: &str,
        outcome: &GenerationOutcome,
    ) -> Result<Tool, ToolError> {
        let Some(source) = outcome.usable_source() else {
            let reason = outcome.failure_reason();
            warn!("[ToolRegistry] Tool {} was not created: {}", name, reason);
            return Err(ToolError::Generation(reason));
        };
        let tool = Tool::new(name, description, source)
            .with_entry_point(outcome.entry_point_hint().map(str::to_string));
        info!("[ToolRegistry] Registered tool {} ({})", tool.name, tool.id);
        self.tools.push(tool.clone());
        Ok(tool)
    }

    /// Compile and run a tool. Failures raised by the behavior come back as
    /// `ToolError::Invocation`; writes it made before failing are kept.
    pub fn execute_tool(
        &self,
        id: &str,
        context: CapabilityContext,
        parameters: &Value,
    ) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ToolError::NotFound(id.to_string()))?;

        let behavior = self
            .compiler
            .compile_tool(&tool.source, tool.entry_point.as_deref())?;
        let context = Rc::new(context);
        match behavior.invoke(Rc::clone(&context), parameters) {
            Ok(result) => {
                info!(
                    "[ToolRegistry] Tool {} finished ({} scene writes)",
                    tool.id,
                    context.mutation_count()
                );
                Ok(result)
            }
            Err(e) => {
                warn!("[ToolRegistry] Tool {} failed: {}", tool.id, e);
                Err(ToolError::Invocation(e.to_string()))
            }
        }
    }

    /// Returns `true` if a tool was removed.
    pub fn delete_tool(&mut self, id: &str) -> bool {
        let before = self.tools.len();
        self.tools.retain(|t| t.id != id);
        let removed = self.tools.len() != before;
        if removed {
            info!("[ToolRegistry] Deleted tool {}", id);
        }
        removed
    }

    /// Register a copy of `id` with new source under a fresh id.
    pub fn derive_tool(&mut self, id: &str, source: &str) -> Result<Tool, ToolError> {
        let original = self.get(id).ok_or_else(|| ToolError::NotFound(id.to_string()))?;
        if source.trim().is_empty() {
            return Err(ToolError::Generation("derived tool has no source text".into()));
        }
        let derived = Tool::new(original.name, original.description, source)
            .with_parameters(original.parameters);
        info!("[ToolRegistry] Derived tool {} from {}", derived.id, id);
        self.tools.push(derived.clone());
        Ok(derived)
    }

    pub fn get(&self, id: &str) -> Option<Tool> {
        self.tools.iter().find(|t| t.id == id).cloned()
    }

    /// All tools in creation order.
    pub fn list(&self) -> Vec<Tool> {
        self.tools.clone()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
