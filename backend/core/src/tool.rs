use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named, reusable generated behavior invoked on demand.
///
/// Records are immutable once created. A "modified" tool is a new record
/// with a new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: String,
    pub name: String,
    pub description: String,
    pub source: String,
    pub created_at: DateTime<Utc>,
    /// Open, untyped parameter schema.
    #[serde(default)]
    pub parameters: serde_json::Value,
    /// Entry-point name declared by the generator, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
}

impl Tool {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("tool_{}", Uuid::new_v4().simple()),
            name: name.into(),
            description: description.into(),
            source: source.into(),
            created_at: Utc::now(),
            parameters: serde_json::json!({}),
            entry_point: None,
        }
    }

    pub fn with_entry_point(mut self, entry_point: Option<String>) -> Self {
        self.entry_point = entry_point;
        self
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }
}
