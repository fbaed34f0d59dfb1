use sceneforge_core::SceneError;
use sceneforge_script::CompileError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("tool generation failed: {0}")]
    Generation(String),

    #[error("tool not found: {0}")]
    NotFound(String),

    #[error("tool source did not compile: {0}")]
    Compile(#[from] CompileError),

    #[error("tool invocation failed: {0}")]
    Invocation(String),
}

impl From<ToolError> for SceneError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::Generation(msg) => SceneError::Generation(msg),
            ToolError::NotFound(id) => SceneError::NotFound(id),
            ToolError::Compile(e) => e.into(),
            ToolError::Invocation(msg) => SceneError::Invocation(msg),
        }
    }
}
