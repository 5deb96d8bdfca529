//! Best-effort JSON extraction from free-text LLM replies.
//!
//! Models wrap JSON in markdown fences, prepend prose, or nest the payload
//! under an arbitrary key. Everything here is tolerant on input and explicit
//! on output: callers get either a `serde_json::Value` or a
//! [`MalformedOutput`] describing what could not be parsed.

use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct MalformedOutput {
    pub reason: String,
    pub raw: String,
}

impl fmt::Display for MalformedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.raw.chars().take(100).collect();
        write!(f, "malformed LLM output ({}): {preview}", self.reason)
    }
}

impl std::error::Error for MalformedOutput {}

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if let Some(fence) = trimmed.find("```") {
        // Remove Markdown fences (```json ... ``` or ``` ... ```).
        let after_open = &trimmed[fence + 3..];
        let inner = match after_open.split_once('\n') {
            Some((_lang, rest)) => rest,
            None => after_open,
        };
        let inner = match inner.find("```") {
            Some(end) => &inner[..end],
            None => inner,
        };
        let inner = inner.trim();
        if inner.starts_with('{') || inner.starts_with('[') {
            return Some(inner.to_string());
        }
    }

    // Best-effort extraction: outermost object or array, whichever opens first.
    let start = trimmed.find(|c: char| c == '{' || c == '[')?;
    let close = if trimmed[start..].starts_with('{') { '}' } else { ']' };
    let end = trimmed.rfind(close)?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].trim().to_string())
}

/// Parses the JSON payload embedded in `text`.
pub fn parse_value(text: &str) -> Result<Value, MalformedOutput> {
    let candidate = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    if candidate.is_empty() {
        return Err(MalformedOutput {
            reason: "empty response".to_string(),
            raw: text.to_string(),
        });
    }
    serde_json::from_str::<Value>(&candidate).map_err(|err| MalformedOutput {
        reason: err.to_string(),
        raw: text.to_string(),
    })
}

/// Parses `text` and requires a JSON object at the top level.
pub fn parse_object(text: &str) -> Result<Map<String, Value>, MalformedOutput> {
    match parse_value(text)? {
        Value::Object(map) => Ok(map),
        other => Err(MalformedOutput {
            reason: format!("expected a JSON object, got {}", kind(&other)),
            raw: text.to_string(),
        }),
    }
}

/// Parses `text` and returns the array it carries: either the top-level value
/// or the first of `wrapper_keys` holding an array.
pub fn parse_array(text: &str, wrapper_keys: &[&str]) -> Result<Vec<Value>, MalformedOutput> {
    let value = parse_value(text)?;
    let found = kind(&value);
    unwrap_array(value, wrapper_keys).ok_or_else(|| MalformedOutput {
        reason: format!(
            "expected an array or an object with one of {wrapper_keys:?}, got {found}"
        ),
        raw: text.to_string(),
    })
}

pub fn unwrap_array(value: Value, wrapper_keys: &[&str]) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => wrapper_keys.iter().find_map(|key| match map.remove(*key) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        }),
        _ => None,
    }
}

/// First non-empty textual value among `keys`. Numbers and booleans are rendered as text.
pub fn text_field(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

pub fn text_field_or(obj: &Map<String, Value>, keys: &[&str], default: &str) -> String {
    text_field(obj, keys).unwrap_or_else(|| default.to_string())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        let fenced = format!("```json\n{body}\n```\n");
        assert_eq!(extract_json(&fenced), Some(body.to_string()));
    }

    #[test]
    fn extract_json_handles_fence_after_prose() {
        let text = "Sure, here you go:\n```\n[1, 2]\n```\nAnything else?";
        assert_eq!(extract_json(text), Some("[1, 2]".to_string()));
    }

    #[test]
    fn extract_json_handles_single_line_fence() {
        let text = "```json {\"a\":1}```";
        assert_eq!(extract_json(text), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
    }

    #[test]
    fn extract_json_prefers_array_when_it_opens_first() {
        let s = "result: [{\"a\":1}, {\"a\":2}] done";
        assert_eq!(extract_json(s), Some("[{\"a\":1}, {\"a\":2}]".to_string()));
    }

    #[test]
    fn parse_array_unwraps_known_keys() {
        let bare = parse_array("[{\"x\":1}]", &["events"]).unwrap();
        assert_eq!(bare.len(), 1);

        let wrapped = parse_array("{\"data\": [1, 2, 3]}", &["events", "data"]).unwrap();
        assert_eq!(wrapped, vec![json!(1), json!(2), json!(3)]);

        let err = parse_array("{\"other\": []}", &["events", "data"]).unwrap_err();
        assert!(err.reason.contains("object"));
    }

    #[test]
    fn parse_value_reports_malformed_text() {
        let err = parse_value("I cannot help with that.").unwrap_err();
        assert_eq!(err.raw, "I cannot help with that.");

        let err = parse_value("   ").unwrap_err();
        assert_eq!(err.reason, "empty response");
    }

    #[test]
    fn parse_object_rejects_arrays() {
        assert!(parse_object("[1]").is_err());
        let obj = parse_object("```json\n{\"explanation\": \"x\"}\n```").unwrap();
        assert_eq!(text_field(&obj, &["explanation"]), Some("x".to_string()));
    }

    #[test]
    fn text_field_uses_aliases_and_renders_numbers() {
        let value = json!({"name": "  Fed decision ", "previous": 2.5, "forecast": "", "flag": true});
        let obj = value.as_object().unwrap();

        assert_eq!(
            text_field(obj, &["event", "name"]),
            Some("Fed decision".to_string())
        );
        assert_eq!(text_field(obj, &["previous"]), Some("2.5".to_string()));
        assert_eq!(text_field_or(obj, &["forecast"], "--"), "--");
        assert_eq!(text_field(obj, &["flag"]), Some("true".to_string()));
    }
}
