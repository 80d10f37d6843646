//! Helpers for pulling structured data out of model output

use crate::types::Payload;
use serde_json::Value;

/// Parse the outermost `{...}` span of `text` as a JSON object.
///
/// Models often wrap JSON in prose or code fences; everything before the
/// first `{` and after the last `}` is ignored.
pub fn extract_json_object(text: &str) -> Option<Payload> {
    match extract_span(text, '{', '}')? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Parse the outermost `[...]` span of `text` as a JSON array
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    match extract_span(text, '[', ']')? {
        Value::Array(items) => Some(items),
        _ => None,
    }
}

fn extract_span(text: &str, open: char, close: char) -> Option<Value> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// String field of a loosely typed record, empty when missing
pub fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

/// Array field of a loosely typed record, empty when missing
pub fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}
