//! Entry-point discovery.
//!
//! Order: `executeTool` for tool behaviors, then an explicit hint, then a
//! declared function definition, then a declared function-valued
//! assignment. Within a strategy the first match in text order wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// Conventional entry point for tool behaviors.
pub const TOOL_ENTRY_POINT: &str = "executeTool";

/// Which calling convention the source is expected to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorKind {
    /// Zero-argument factory returning a mesh table.
    Object,
    /// `(context, parameters) -> result`.
    Tool,
}

static IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

// `function Name(` and `local function Name(`. Dotted and method names
// (`function M.f(`, `function M:f(`) never match because `(` must follow
// the identifier directly.
static FUNCTION_DECL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)(?:^|[^A-Za-z0-9_.:])(?:local\s+)?function\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(")
        .unwrap()
});

// `Name = function(` and `local Name = function(`, excluding field
// assignments like `t.Name = function(`.
static FUNCTION_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?m)(?:^|[^A-Za-z0-9_.:])(?:local\s+)?",
        r"([A-Za-z_][A-Za-z0-9_]*)\s*=\s*function\s*\(",
    ))
    .unwrap()
});

const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

fn is_identifier(name: &str) -> bool {
    IDENT.is_match(name) && !KEYWORDS.contains(&name)
}

fn declared_functions(source: &str) -> impl Iterator<Item = &str> {
    FUNCTION_DECL
        .captures_iter(source)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .filter(|name| is_identifier(name))
}

fn assigned_functions(source: &str) -> impl Iterator<Item = &str> {
    FUNCTION_ASSIGN
        .captures_iter(source)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .filter(|name| is_identifier(name))
}

/// Find the name to resolve after evaluating `source`.
///
/// A hint is used as-is when it is a valid identifier; it does not need to
/// match a declaration, since resolution will report `NotCallable` if it
/// names nothing.
pub fn find_entry_point(source: &str, hint: Option<&str>, kind: BehaviorKind) -> Option<String> {
    if kind == BehaviorKind::Tool {
        let declares_tool = declared_functions(source)
            .chain(assigned_functions(source))
            .any(|name| name == TOOL_ENTRY_POINT);
        if declares_tool {
            return Some(TOOL_ENTRY_POINT.to_string());
        }
    }

    if let Some(hint) = hint.map(str::trim).filter(|h| is_identifier(h)) {
        return Some(hint.to_string());
    }

    declared_functions(source)
        .next()
        .or_else(|| assigned_functions(source).next())
        .map(str::to_string)
}
