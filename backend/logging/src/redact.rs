//! Scrubs API keys and bearer tokens from text before it is logged.

use regex::Regex;
use std::sync::LazyLock;

static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sk-[A-Za-z0-9_-]{20,}").unwrap());
static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Bearer\s+[A-Za-z0-9\-._~+/]+=*").unwrap());
static KEY_FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"("(?:apiKey|api_key|token)"\s*:\s*")[^"]+(")"#).unwrap());

pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = KEY_FIELD_RE.replace_all(input, "${1}[REDACTED_TOKEN]${2}");
    let redacted = BEARER_RE.replace_all(&redacted, "[REDACTED_TOKEN]");
    API_KEY_RE.replace_all(&redacted, "[REDACTED_TOKEN]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrubs_keys_and_bearer_tokens() {
        let raw = "POST with Bearer eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9 \
                   key sk-or-v1-0123456789abcdef0123";
        let clean = redact_sensitive_data(raw);
        assert!(!clean.contains("eyJhbGci"));
        assert!(!clean.contains("0123456789abcdef"));
        assert_eq!(clean.matches("[REDACTED_TOKEN]").count(), 2);
    }

    #[test]
    fn scrubs_json_key_fields() {
        let clean = redact_sensitive_data(r#"{"apiKey":"short","model":"m"}"#);
        assert_eq!(clean, r#"{"apiKey":"[REDACTED_TOKEN]","model":"m"}"#);
    }

    #[test]
    fn leaves_behavior_source_alone() {
        let src = "function Glow() return { color = '#ff00ff' } end";
        assert_eq!(redact_sensitive_data(src), src);
    }
}
