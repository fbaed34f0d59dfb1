use sceneforge_core::SceneError;
use thiserror::Error;

/// Why source text could not be turned into a callable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("no entry point declared in source")]
    NoEntryPoint,

    #[error("evaluation failed: {0}")]
    Evaluation(String),

    #[error("entry point {name} resolved to {found}, not a function")]
    NotCallable { name: String, found: String },
}

/// Failures while running compiled behavior.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The factory ran but did not produce a usable fragment.
    #[error("mount failed: {0}")]
    Mount(String),

    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error("interpreter setup failed: {0}")]
    Setup(String),
}

impl From<CompileError> for SceneError {
    fn from(err: CompileError) -> Self {
        SceneError::Compile(err.to_string())
    }
}

impl From<ScriptError> for SceneError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::Compile(e) => e.into(),
            ScriptError::Mount(msg) => SceneError::Compile(msg),
            ScriptError::Invocation(msg) => SceneError::Invocation(msg),
            ScriptError::Setup(msg) => SceneError::Config(msg),
        }
    }
}

/// Flatten an interpreter error into a single readable line.
pub(crate) fn format_lua_error(err: &mlua::Error) -> String {
    match err {
        mlua::Error::RuntimeError(msg) => msg.clone(),
        mlua::Error::CallbackError { cause, .. } => format_lua_error(cause),
        mlua::Error::SyntaxError { message, .. } => format!("syntax error: {message}"),
        mlua::Error::MemoryError(msg) => format!("memory limit exceeded: {msg}"),
        _ => err.to_string(),
    }
}
