//! Post-processing for model output.
//!
//! Each cleanup is applied until the text stops changing, so running a
//! sanitizer on its own output is a no-op.

use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static HEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s*").expect("heading regex"));
static BOLD_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").expect("bold regex"));
static CODE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"`([^`]*)`").expect("code span regex"));
static DIV_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?div[^>]*>").expect("div tag regex"));
static BRACE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("brace span regex"));

fn until_stable(text: &str, pass: impl Fn(&str) -> String) -> String {
    let mut current = pass(text);
    loop {
        let next = pass(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_markdown_once(text: &str) -> String {
    let text = HEADING_MARKER.replace_all(text, "");
    let text = BOLD_SPAN.replace_all(&text, "$1");
    let text = CODE_SPAN.replace_all(&text, "$1");
    text.trim().to_string()
}

/// Remove heading markers at line starts, unwrap `**bold**` and `` `code` ``
/// spans, and trim surrounding whitespace.
pub fn strip_markdown(text: &str) -> String {
    until_stable(text, strip_markdown_once)
}

/// Remove `<div ...>` and `</div>` tags, keeping their inner text.
pub fn strip_html_divs(text: &str) -> String {
    until_stable(text, |t| DIV_TAG.replace_all(t, "").into_owned())
}

/// Pull a JSON object out of free-form model output.
///
/// Tries the whole text first, then the span from the first `{` to the last
/// `}`. Anything that is not a JSON object yields an empty map.
pub fn extract_json(text: &str) -> Map<String, Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return match value {
            Value::Object(map) => map,
            other => {
                tracing::debug!(kind = value_kind(&other), "Extraction output is not an object");
                Map::new()
            }
        };
    }

    let Some(span) = BRACE_SPAN.find(text) else {
        tracing::debug!("No JSON object found in extraction output");
        return Map::new();
    };

    match serde_json::from_str::<Value>(span.as_str()) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) => {
            tracing::debug!("Embedded JSON span did not parse as an object");
            Map::new()
        }
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
