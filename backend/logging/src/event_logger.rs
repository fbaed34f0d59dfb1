//! Scene event logger.
//!
//! Events are serialized, scrubbed and emitted through `tracing` under the
//! `scene_events` target, so they land in the NDJSON file alongside
//! everything else.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::redact::redact_sensitive_data;

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub event: Value,
}

pub struct EventLogger;

impl EventLogger {
    /// Build the redacted entry for `event`.
    pub fn entry<E: Serialize>(session_id: &str, event: &E) -> Option<EventLogEntry> {
        let raw = match serde_json::to_string(event) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Scene event could not be serialized");
                return None;
            }
        };
        let event = serde_json::from_str(&redact_sensitive_data(&raw))
            .unwrap_or(Value::String(redact_sensitive_data(&raw)));
        Some(EventLogEntry {
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
            event,
        })
    }

    pub fn log_event<E: Serialize>(session_id: &str, event: &E) {
        if let Some(entry) = Self::entry(session_id, event) {
            info!(
                target: "scene_events",
                session_id = %entry.session_id,
                event = %entry.event,
                "Scene event"
            );
        }
    }
}
