//! Structured logging for SceneForge.
//!
//! Console output, a daily-rolling NDJSON file, redaction of secrets, and a
//! scene event logger.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger};
pub use logger::{init_console, init_logger};
pub use redact::redact_sensitive_data;
