//! Variable bindings flowing through a run.
//!
//! Bindings are the flat key → value map that trigger data, dispatcher
//! outputs, and the base context all merge into. Values are arbitrary JSON;
//! the interpolator coerces them to strings at substitution time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A flat map of variable name → JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bindings(HashMap<String, Value>);

impl Bindings {
    /// Create an empty bindings map.
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    /// Base execution context merged beneath trigger data: actor identity
    /// plus current timestamp fields.
    pub fn base_context(actor: &str, now: DateTime<Utc>) -> Self {
        let mut bindings = Self::new();
        bindings.set("actor", Value::String(actor.to_string()));
        bindings.set(
            "current_date",
            Value::String(now.format("%Y-%m-%d").to_string()),
        );
        bindings.set(
            "current_time",
            Value::String(now.format("%H:%M:%S").to_string()),
        );
        bindings.set("timestamp", Value::String(now.to_rfc3339()));
        bindings
    }

    /// Set a binding.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Get a binding by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a binding coerced to its string form, the same coercion the
    /// interpolator applies: strings verbatim, everything else via JSON
    /// serialization.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.0.get(key).map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Check whether a key is bound.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if there are no bindings.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Merge another bindings map into this one. Keys from `other` win on
    /// collision (trigger data over base context, step output over input).
    pub fn merge(&mut self, other: &Bindings) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }

    /// Merge the top-level fields of a JSON object into the bindings.
    /// Non-object values merge nothing.
    pub fn merge_object(&mut self, value: &Value) {
        if let Value::Object(map) = value {
            for (k, v) in map {
                self.0.insert(k.clone(), v.clone());
            }
        }
    }

    /// Iterate over all bindings.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

impl From<HashMap<String, Value>> for Bindings {
    fn from(map: HashMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for Bindings {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
