//! `${VAR_NAME}` substitution in config string values.
//!
//! Only uppercase `[A-Z_][A-Z0-9_]*` names are recognised. `$${VAR}` is an
//! escape and resolves to the literal text `${VAR}`.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;

/// Either an escaped reference (`$${NAME}`, group 1) or a real one
/// (`${NAME}`, group 2). The alternation order makes escapes win.
static REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\$\{([A-Z_][A-Z0-9_]*)\}|\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Substitute references throughout a config value tree using the process
/// environment. Unset or empty variables are an error.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    let env: HashMap<String, String> = std::env::vars().collect();
    resolve_env_vars_with(value, &env)
}

/// Same as `resolve_env_vars` with an explicit variable map.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    Ok(substitute_value(value, env, "")?)
}

fn substitute_value(
    value: &Value,
    env: &HashMap<String, String>,
    path: &str,
) -> Result<Value, MissingEnvVarError> {
    match value {
        Value::String(s) => substitute_string(s, env, path).map(Value::String),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                let child = if path.is_empty() { k.clone() } else { format!("{path}.{k}") };
                out.insert(k.clone(), substitute_value(v, env, &child)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(
    s: &str,
    env: &HashMap<String, String>,
    path: &str,
) -> Result<String, MissingEnvVarError> {
    if !s.contains("${") {
        return Ok(s.to_string());
    }

    let mut missing = None;
    let replaced = REFERENCE.replace_all(s, |caps: &Captures| {
        if let Some(escaped) = caps.get(1) {
            return format!("${{{}}}", escaped.as_str());
        }
        let name = &caps[2];
        match env.get(name).filter(|v| !v.is_empty()) {
            Some(val) => val.clone(),
            None => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    match missing {
        Some(err) => Err(err),
        None => Ok(replaced.into_owned()),
    }
}

/// Names of every variable referenced in a value tree, sorted and unique.
pub fn collect_referenced_vars(value: &Value) -> Vec<String> {
    let mut vars = Vec::new();
    collect_vars(value, &mut vars);
    vars.sort();
    vars.dedup();
    vars
}

fn collect_vars(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            out.extend(
                REFERENCE
                    .captures_iter(s)
                    .filter_map(|c| c.get(2))
                    .map(|m| m.as_str().to_string()),
            );
        }
        Value::Array(items) => items.iter().for_each(|v| collect_vars(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_vars(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_nested_api_key() {
        let v = json!({"gateway": {"apiKey": "${OPENROUTER_API_KEY}"}});
        let vars = env(&[("OPENROUTER_API_KEY", "sk-or-123")]);
        let result = resolve_env_vars_with(&v, &vars).unwrap();
        assert_eq!(result["gateway"]["apiKey"], "sk-or-123");
    }

    #[test]
    fn missing_var_names_the_path() {
        let v = json!({"gateway": {"baseUrl": "http://${GPU_HOST}:11434"}});
        let err = resolve_env_vars_with(&v, &HashMap::new()).unwrap_err().to_string();
        assert!(err.contains("GPU_HOST"));
        assert!(err.contains("gateway.baseUrl"));
    }

    #[test]
    fn escape_keeps_literal_reference() {
        let v = json!({"note": "use $${HOME} literally, not ${USER_NAME}"});
        let result = resolve_env_vars_with(&v, &env(&[("USER_NAME", "ada")])).unwrap();
        assert_eq!(result["note"], "use ${HOME} literally, not ada");
    }

    #[test]
    fn non_strings_pass_through() {
        let v = json!({"frame": {"tickHz": 30}, "list": ["a", true]});
        assert_eq!(resolve_env_vars_with(&v, &HashMap::new()).unwrap(), v);
    }

    #[test]
    fn collects_only_real_references() {
        let v = json!({"a": "${FOO}", "b": ["${BAR}", "$${SKIP}"]});
        assert_eq!(collect_referenced_vars(&v), vec!["BAR", "FOO"]);
    }
}
