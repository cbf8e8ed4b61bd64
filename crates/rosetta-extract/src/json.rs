//! Lenient JSON lookups
//!
//! CRM documents are inconsistent about ids (sometimes strings, sometimes
//! numbers) and about nesting. These helpers return `None` instead of failing.
//! The extraction run uses the same helpers, so persisted documents and
//! extracted references agree on what counts as a value.

use serde_json::Value;

/// Value at a dot-separated path
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        match current {
            Value::Object(map) => current = map.get(segment)?,
            _ => return None,
        }
    }
    Some(current)
}

/// Non-empty string (or number rendered as string) at `path`
pub fn text_at(value: &Value, path: &str) -> Option<String> {
    get_path(value, path).and_then(as_text)
}

/// Non-empty string form of a scalar
pub fn as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Array at `path`, empty when missing or not an array
pub fn array_at<'a>(value: &'a Value, path: &str) -> &'a [Value] {
    get_path(value, path)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

/// Module name from either `"Deals"` or `{"api_name": "Deals"}`
pub fn module_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(_) => text_at(value, "api_name").or_else(|| text_at(value, "name")),
        other => as_text(other),
    }
}

/// First element of `key` when the document is a `{key: [doc]}` envelope
pub fn unwrap_envelope<'a>(value: &'a Value, key: &str) -> &'a Value {
    match get_path(value, key).and_then(Value::as_array) {
        Some(items) if !items.is_empty() => &items[0],
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_render_as_text() {
        let doc = json!({"field": {"id": 3193870000000002575_u64}});
        assert_eq!(text_at(&doc, "field.id").as_deref(), Some("3193870000000002575"));
    }

    #[test]
    fn blank_strings_are_absent() {
        let doc = json!({"name": "  "});
        assert_eq!(text_at(&doc, "name"), None);
        assert_eq!(text_at(&doc, "missing.deeper"), None);
    }

    #[test]
    fn module_name_accepts_both_shapes() {
        assert_eq!(module_name(&json!("Deals")).as_deref(), Some("Deals"));
        assert_eq!(module_name(&json!({"api_name": "Leads"})).as_deref(), Some("Leads"));
        assert_eq!(module_name(&json!(null)), None);
    }

    #[test]
    fn envelope_is_unwrapped() {
        let wrapped = json!({"workflow_rules": [{"id": "1"}]});
        assert_eq!(unwrap_envelope(&wrapped, "workflow_rules"), &json!({"id": "1"}));
        let bare = json!({"id": "2"});
        assert_eq!(unwrap_envelope(&bare, "workflow_rules"), &bare);
    }
}
