//! Safe-to-display config snapshots with secrets masked.

use serde_json::Value;

static SENSITIVE_KEYS: &[&str] = &[
    "apiKey",
    "api_key",
    "token",
    "accessToken",
    "access_token",
    "secret",
    "password",
];

/// Replace every sensitive string with its first four characters plus
/// `***` (or just `***` for short values).
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    SENSITIVE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
}

fn mask(s: &str) -> String {
    let prefix: String = s.chars().take(4).collect();
    if s.chars().count() > 4 {
        format!("{prefix}***")
    } else {
        "***".to_string()
    }
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if is_sensitive_key(key) && !s.is_empty() => Value::String(mask(s)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| redact_recursive(v, key)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_recursive(v, k)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Dotted paths of every value `redact` would mask.
pub fn collect_redacted_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths(value, "", &mut paths);
    paths
}

fn collect_paths(value: &Value, path: &str, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() => {
            let key = path.rsplit('.').next().unwrap_or("");
            if is_sensitive_key(key) {
                out.push(path.to_string());
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                collect_paths(v, &child, out);
            }
        }
        _ => {}
    }
}
