//! Diff generation for audit logging
//!
//! Summarizes top-level field changes between two JSON values.

use serde_json::Value;

/// Longest string shown verbatim in a diff
const MAX_SHOWN_CHARS: usize = 50;

/// Generate a human-readable diff between two JSON values
///
/// Only top-level fields are compared. Returns `None` when nothing changed.
pub fn generate_diff(before: &Value, after: &Value) -> Option<String> {
    match (before, after) {
        (Value::Object(before_obj), Value::Object(after_obj)) => {
            let mut changes = Vec::new();

            for (key, before_val) in before_obj {
                match after_obj.get(key) {
                    Some(after_val) if after_val != before_val => changes.push(format!(
                        "{}: {} -> {}",
                        key,
                        format_value(before_val),
                        format_value(after_val)
                    )),
                    Some(_) => {}
                    None => changes.push(format!(
                        "{}: {} -> (removed)",
                        key,
                        format_value(before_val)
                    )),
                }
            }

            for (key, after_val) in after_obj {
                if !before_obj.contains_key(key) {
                    changes.push(format!("{}: (added) -> {}", key, format_value(after_val)));
                }
            }

            if changes.is_empty() {
                None
            } else {
                Some(changes.join(", "))
            }
        }
        _ if before != after => Some(format!(
            "{} -> {}",
            format_value(before),
            format_value(after)
        )),
        _ => None,
    }
}

/// Format a JSON value for human-readable display
fn format_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            if s.chars().count() > MAX_SHOWN_CHARS {
                let shown: String = s.chars().take(MAX_SHOWN_CHARS - 3).collect();
                format!("\"{}...\"", shown)
            } else {
                format!("\"{}\"", s)
            }
        }
        Value::Array(arr) => format!("[{} items]", arr.len()),
        Value::Object(obj) => format!("{{{} fields}}", obj.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_field_change() {
        let before = json!({"alias": "Phone", "apiURL": "https://a.b/k/"});
        let after = json!({"alias": "Tablet", "apiURL": "https://a.b/k/"});

        let diff = generate_diff(&before, &after).unwrap();
        assert_eq!(diff, "alias: \"Phone\" -> \"Tablet\"");
    }

    #[test]
    fn test_field_added_and_removed() {
        let before = json!({"server": "https://a.b"});
        let after = json!({"deviceKey": "k"});

        let diff = generate_diff(&before, &after).unwrap();
        assert!(diff.contains("server: \"https://a.b\" -> (removed)"));
        assert!(diff.contains("deviceKey: (added) -> \"k\""));
    }

    #[test]
    fn test_no_changes() {
        let value = json!({"themeMode": "dark"});
        assert!(generate_diff(&value, &value).is_none());
    }

    #[test]
    fn test_scalar_change() {
        assert_eq!(
            generate_diff(&json!("en"), &json!("de")).unwrap(),
            "\"en\" -> \"de\""
        );
    }

    #[test]
    fn test_long_multibyte_string_truncated() {
        let long = "é".repeat(80);
        let diff = generate_diff(&json!({"a": long}), &json!({"a": 1})).unwrap();
        assert!(diff.contains("...\""));
    }
}
