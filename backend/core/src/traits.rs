use anyhow::Result;
use async_trait::async_trait;

use crate::generation::{GenerationOutcome, GenerationRequest};

/// External service that turns a natural-language request into behavior
/// source text.
///
/// Implementations may fail or return `success: false`; callers treat both
/// the same way.
#[async_trait]
pub trait GenerationGateway: Send + Sync {
    /// Human-readable name (e.g., "llm", "canned").
    fn name(&self) -> &str;

    /// Ask for generated source.
    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationOutcome>;
}

/// Small key/value persistence used for credentials and settings.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}
