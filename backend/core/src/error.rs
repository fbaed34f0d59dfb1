use thiserror::Error;

/// Top-level error type for the SceneForge runtime.
///
/// Crate-local errors (registry, script, tool) convert into this taxonomy so
/// that coordinators can report every failure through one channel.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("generation failed: {0}")]
    Generation(String),

    #[error("compile failed: {0}")]
    Compile(String),

    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error("id already exists: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("registry busy: {0}")]
    Busy(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Outcome of a registry operation that did not apply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("object id already exists: {0}")]
    Conflict(String),

    #[error("object not found: {0}")]
    NotFound(String),

    #[error("invalid object record: {0}")]
    Invalid(String),

    /// The registry was already borrowed further up the call stack.
    #[error("object registry is busy ({0})")]
    Busy(&'static str),
}

impl From<RegistryError> for SceneError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Conflict(id) => SceneError::Conflict(id),
            RegistryError::NotFound(id) => SceneError::NotFound(id),
            RegistryError::Invalid(msg) => SceneError::InvalidRecord(msg),
            RegistryError::Busy(op) => SceneError::Busy(op.to_string()),
        }
    }
}
