use once_cell::sync::Lazy;
use regex::Regex;

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z0-9_+-]*[ \t]*\r?\n(.*?)```").unwrap());

static DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*--\s*([A-Za-z]+)\s*:\s*(.+?)\s*$").unwrap());

/// Pull the first fenced code block out of a completion. Without a fence
/// the whole completion is returned, trimmed.
pub fn extract_code(completion: &str) -> String {
    match FENCE.captures(completion).and_then(|c| c.get(1)) {
        Some(body) => body.as_str().trim().to_string(),
        None => completion.trim().to_string(),
    }
}

/// Value of a `-- name: value` comment line, if present.
pub fn find_directive(source: &str, name: &str) -> Option<String> {
    DIRECTIVE
        .captures_iter(source)
        .find(|c| c.get(1).is_some_and(|m| m.as_str().eq_ignore_ascii_case(name)))
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_fence() {
        let text = "intro\n```lua\nfunction A() end\n```\nmiddle\n```\nsecond\n```";
        assert_eq!(extract_code(text), "function A() end");
    }

    #[test]
    fn unfenced_text_passes_through() {
        assert_eq!(extract_code("  function A() end \n"), "function A() end");
    }

    #[test]
    fn reads_directives() {
        let src = "-- entry: Spinner\n--features: spin, glow\nfunction Spinner() end";
        assert_eq!(find_directive(src, "entry").as_deref(), Some("Spinner"));
        assert_eq!(find_directive(src, "features").as_deref(), Some("spin, glow"));
        assert_eq!(find_directive(src, "type"), None);
    }
}
