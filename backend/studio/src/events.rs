use serde::Serialize;
use serde_json::Value;

use sceneforge_core::{GenerationKind, GenerationOutcome, ObjectId};
use sceneforge_renderer::FaultKind;

/// Handle returned by every `request_*` call.
pub type RequestId = u64;

/// Something the presentation layer may want to show.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StudioEvent {
    ObjectAdded {
        object_id: ObjectId,
        kind: String,
    },
    ObjectSynthesized {
        request: RequestId,
        object_id: ObjectId,
        prompt: String,
    },
    ObjectRevised {
        request: RequestId,
        object_id: ObjectId,
    },
    ObjectDeleted {
        object_id: ObjectId,
    },
    ToolCreated {
        request: RequestId,
        tool_id: String,
        name: String,
    },
    ToolExecuted {
        tool_id: String,
        success: bool,
        detail: Option<String>,
    },
    UiGenerated {
        request: RequestId,
        index: usize,
    },
    SelfReviewed {
        request: RequestId,
        improvements: Vec<String>,
        confidence: Option<f64>,
    },
    GenerationFailed {
        request: RequestId,
        kind: GenerationKind,
        reason: String,
    },
    /// A synthesized object could not be compiled or mounted, or one of its
    /// callbacks failed during a frame.
    Fault {
        object_id: ObjectId,
        kind: FaultKind,
        reason: String,
    },
}

/// A generated presentation panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiPanel {
    pub description: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// What the studio does with an outcome once it arrives.
#[derive(Debug, Clone)]
pub(crate) enum PendingJob {
    Object { prompt: String },
    Tool { name: String, description: String },
    Revision { object_id: ObjectId },
    Ui { description: String },
    SelfReview,
}

impl PendingJob {
    pub(crate) fn kind(&self) -> GenerationKind {
        match self {
            // Tool source is requested as object-kind generation with a
            // tool-shaped prompt.
            PendingJob::Object { .. } | PendingJob::Tool { .. } => GenerationKind::Object,
            PendingJob::Revision { .. } => GenerationKind::Code,
            PendingJob::Ui { .. } => GenerationKind::Ui,
            PendingJob::SelfReview => GenerationKind::SelfModify,
        }
    }
}

/// Message sent from a generation task back to the studio.
#[derive(Debug)]
pub(crate) struct Completion {
    pub request: RequestId,
    pub job: PendingJob,
    pub result: Result<GenerationOutcome, String>,
}
