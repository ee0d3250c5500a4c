//! `{{name}}` placeholder interpolation.
//!
//! Pure functions that substitute placeholders in arbitrary nested JSON
//! against a flat [`Bindings`] map. Keys absent from the bindings are left
//! as literal `{{key}}` text; a missing variable is not an error, because
//! step parameters routinely reference outputs of steps that only exist on
//! some paths.

use relay_types::Bindings;
use serde_json::Value;

/// Substitute every `{{key}}` occurrence in a string.
///
/// Bound values are coerced to strings: JSON strings verbatim, everything
/// else via serialization. Unterminated `{{` sequences and unknown keys pass
/// through unchanged.
pub fn interpolate_str(template: &str, bindings: &Bindings) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        output.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];

        match after_open.find("}}") {
            Some(close) => {
                let key = after_open[..close].trim();
                match bindings.get_str(key) {
                    Some(value) => output.push_str(&value),
                    None => {
                        // Unknown key: keep the literal placeholder.
                        output.push_str(&rest[open..open + 2 + close + 2]);
                    }
                }
                rest = &after_open[close + 2..];
            }
            None => {
                // No closing braces; emit the remainder verbatim.
                output.push_str(&rest[open..]);
                rest = "";
            }
        }
    }

    output.push_str(rest);
    output
}

/// Substitute placeholders throughout a JSON value, returning a structurally
/// identical value. Only strings are rewritten; keys, numbers, and booleans
/// are untouched.
pub fn interpolate(value: &Value, bindings: &Bindings) -> Value {
    match value {
        Value::String(s) => Value::String(interpolate_str(s, bindings)),
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| interpolate(v, bindings)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), interpolate(v, bindings)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bindings(pairs: &[(&str, Value)]) -> Bindings {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_simple_substitution() {
        let b = bindings(&[("email", json!("a@b.com"))]);
        assert_eq!(interpolate_str("send to {{email}}", &b), "send to a@b.com");
    }

    #[test]
    fn test_missing_key_left_literal() {
        let b = Bindings::new();
        assert_eq!(interpolate_str("send to {{email}}", &b), "send to {{email}}");
    }

    #[test]
    fn test_object_substitution() {
        let b = bindings(&[("email", json!("a@b.com"))]);
        let result = interpolate(&json!({"to": "{{email}}"}), &b);
        assert_eq!(result, json!({"to": "a@b.com"}));

        let unchanged = interpolate(&json!({"to": "{{email}}"}), &Bindings::new());
        assert_eq!(unchanged, json!({"to": "{{email}}"}));
    }

    #[test]
    fn test_deep_nesting() {
        let b = bindings(&[("name", json!("Ann")), ("count", json!(3))]);
        let value = json!({
            "message": {
                "lines": ["Hello {{name}}", "You have {{count}} items"],
                "meta": {"note": "{{name}} / {{missing}}"}
            }
        });
        let result = interpolate(&value, &b);
        assert_eq!(
            result,
            json!({
                "message": {
                    "lines": ["Hello Ann", "You have 3 items"],
                    "meta": {"note": "Ann / {{missing}}"}
                }
            })
        );
    }

    #[test]
    fn test_non_string_values_coerced() {
        let b = bindings(&[("n", json!(42)), ("flag", json!(true))]);
        assert_eq!(interpolate_str("{{n}}-{{flag}}", &b), "42-true");
    }

    #[test]
    fn test_numbers_and_booleans_untouched() {
        let b = bindings(&[("x", json!("1"))]);
        let value = json!({"count": 2, "on": false, "nothing": null});
        assert_eq!(interpolate(&value, &b), value);
    }

    #[test]
    fn test_multiple_occurrences() {
        let b = bindings(&[("name", json!("Ann"))]);
        assert_eq!(
            interpolate_str("{{name}}, meet {{name}}", &b),
            "Ann, meet Ann"
        );
    }

    #[test]
    fn test_unterminated_placeholder() {
        let b = bindings(&[("name", json!("Ann"))]);
        assert_eq!(interpolate_str("hello {{name", &b), "hello {{name");
    }

    #[test]
    fn test_whitespace_inside_braces() {
        let b = bindings(&[("name", json!("Ann"))]);
        assert_eq!(interpolate_str("hi {{ name }}", &b), "hi Ann");
    }

    #[test]
    fn test_is_pure() {
        let b = bindings(&[("k", json!("v"))]);
        let value = json!({"a": "{{k}}"});
        let before = value.clone();
        let _ = interpolate(&value, &b);
        assert_eq!(value, before);
    }
}
