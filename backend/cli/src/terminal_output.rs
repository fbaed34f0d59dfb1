//! Terminal output: colored notes, tables and one-line event summaries.

use sceneforge_studio::StudioEvent;

// ---------------------------------------------------------------------------
// ANSI helpers
// ---------------------------------------------------------------------------

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";

pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";

/// Honors `NO_COLOR` and dumb terminals.
pub fn supports_color() -> bool {
    std::env::var("NO_COLOR").is_err()
        && (std::env::var("COLORTERM").is_ok()
            || std::env::var("TERM").map(|t| t != "dumb").unwrap_or(false))
}

pub fn strip_ansi(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

pub fn note_info(msg: &str) {
    if supports_color() {
        println!("{CYAN}{BOLD}i{RESET} {msg}");
    } else {
        println!("INFO: {msg}");
    }
}

pub fn note_warn(msg: &str) {
    if supports_color() {
        println!("{YELLOW}{BOLD}!{RESET} {msg}");
    } else {
        println!("WARN: {msg}");
    }
}

pub fn note_error(msg: &str) {
    if supports_color() {
        eprintln!("{RED}{BOLD}x{RESET} {msg}");
    } else {
        eprintln!("ERROR: {msg}");
    }
}

pub fn note_success(msg: &str) {
    if supports_color() {
        println!("{GREEN}{BOLD}+{RESET} {msg}");
    } else {
        println!("OK: {msg}");
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
}

/// One-line summary of a studio event.
pub fn describe_event(event: &StudioEvent) -> (Severity, String) {
    match event {
        StudioEvent::ObjectAdded { object_id, kind } => {
            (Severity::Info, format!("added {kind} {object_id}"))
        }
        StudioEvent::ObjectSynthesized { object_id, prompt, .. } => {
            (Severity::Success, format!("synthesized {object_id} from \"{prompt}\""))
        }
        StudioEvent::ObjectRevised { object_id, .. } => {
            (Severity::Success, format!("revised {object_id}"))
        }
        StudioEvent::ObjectDeleted { object_id } => {
            (Severity::Info, format!("deleted {object_id}"))
        }
        StudioEvent::ToolCreated { tool_id, name, .. } => {
            (Severity::Success, format!("created tool {name} ({tool_id})"))
        }
        StudioEvent::ToolExecuted { tool_id, success: true, .. } => {
            (Severity::Success, format!("tool {tool_id} finished"))
        }
        StudioEvent::ToolExecuted { tool_id, detail, .. } => (
            Severity::Error,
            format!("tool {tool_id} failed: {}", detail.as_deref().unwrap_or("unknown error")),
        ),
        StudioEvent::UiGenerated { index, .. } => {
            (Severity::Info, format!("generated UI panel #{index}"))
        }
        StudioEvent::SelfReviewed { improvements, confidence, .. } => (
            Severity::Info,
            format!(
                "self review: {} (confidence {})",
                improvements.join("; "),
                confidence.map_or("n/a".to_string(), |c| format!("{c:.2}"))
            ),
        ),
        StudioEvent::GenerationFailed { kind, reason, .. } => {
            (Severity::Warn, format!("{kind} generation failed: {reason}"))
        }
        StudioEvent::Fault { object_id, kind, reason } => {
            (Severity::Warn, format!("{object_id} {kind:?} fault: {reason}"))
        }
    }
}

pub fn print_event(event: &StudioEvent) {
    let (severity, line) = describe_event(event);
    match severity {
        Severity::Info => note_info(&line),
        Severity::Success => note_success(&line),
        Severity::Warn => note_warn(&line),
        Severity::Error => note_error(&line),
    }
}

// ---------------------------------------------------------------------------
// Table rendering
// ---------------------------------------------------------------------------

/// Left-aligned table with a bold header.
pub fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(widths.len()) {
            widths[i] = widths[i].max(strip_ansi(cell).chars().count());
        }
    }

    let pad = |s: &str, width: usize| {
        let visible = strip_ansi(s).chars().count();
        format!("{s}{}", " ".repeat(width.saturating_sub(visible)))
    };

    let mut out = String::new();
    let header: Vec<String> = headers.iter().zip(&widths).map(|(h, w)| pad(h, *w)).collect();
    out.push_str(&format!("{BOLD}  {}{RESET}\n", header.join("  ").trim_end()));
    let sep: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    out.push_str(&format!("  {}\n", sep.join("  ")));
    for row in rows {
        let cells: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, w)| pad(row.get(i).map(String::as_str).unwrap_or(""), *w))
            .collect();
        out.push_str(&format!("  {}\n", cells.join("  ").trim_end()));
    }
    out
}
