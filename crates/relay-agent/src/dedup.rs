//! Duplicate-action detection.
//!
//! An agent run must not perform the same side effect twice: sending the
//! same message again because the oracle repeated itself is worse than
//! doing nothing. A dedup key is the capability name plus a canonical form
//! of its arguments, with object keys sorted recursively, so two calls that
//! differ only in key order collide.

use std::collections::HashSet;

use serde_json::{Map, Value};

/// Rewrite a JSON value with all object keys sorted, recursively.
pub fn canonical_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by_key(|(k, _)| k.as_str());
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k.clone(), canonical_json(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical_json).collect()),
        other => other.clone(),
    }
}

/// The run-scoped identity of a capability invocation.
pub fn dedup_key(capability: &str, arguments: &Value) -> String {
    format!("{capability}:{}", canonical_json(arguments))
}

/// Keys already executed successfully within one run.
///
/// Insertion order is kept so a rehydrated set replays the run's history
/// faithfully.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
    order: Vec<String>,
}

impl DedupSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key. Returns `false` if it was already present.
    pub fn insert(&mut self, key: String) -> bool {
        if !self.seen.insert(key.clone()) {
            return false;
        }
        self.order.push(key);
        true
    }

    /// Whether a key has been recorded.
    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in the order they were first recorded.
    pub fn keys(&self) -> &[String] {
        &self.order
    }
}

impl FromIterator<String> for DedupSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.insert(key);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_insensitive() {
        let a = dedup_key("send_message", &json!({"to": "x", "body": "hi"}));
        let b = dedup_key("send_message", &json!({"body": "hi", "to": "x"}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_nested_objects_canonicalized() {
        let a = dedup_key("append_record", &json!({"fields": {"b": 1, "a": 2}}));
        let b = dedup_key("append_record", &json!({"fields": {"a": 2, "b": 1}}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_arguments_distinct() {
        let a = dedup_key("send_message", &json!({"to": "x"}));
        let b = dedup_key("send_message", &json!({"to": "y"}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_capability_part_of_identity() {
        let a = dedup_key("send_message", &json!({}));
        let b = dedup_key("append_record", &json!({}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_array_order_significant() {
        let a = dedup_key("append_record", &json!({"rows": [1, 2]}));
        let b = dedup_key("append_record", &json!({"rows": [2, 1]}));
        assert_ne!(a, b);
    }

    #[test]
    fn test_set_rejects_duplicates_and_keeps_order() {
        let mut set = DedupSet::new();
        assert!(set.insert("a".to_string()));
        assert!(set.insert("b".to_string()));
        assert!(!set.insert("a".to_string()));
        assert_eq!(set.keys(), ["a", "b"]);
        assert!(set.contains("b"));
    }
}
