//! The connector seam.
//!
//! A [`Connector`] maps one logical capability name to a concrete external
//! call. Connectors may fail internally with [`CapabilityError`]; the
//! dispatcher owns converting that into a returned [`Outcome`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// The structured result of one capability invocation.
///
/// This is a value, never an error: callers branch on `success` and must not
/// expect a dispatch to throw.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Outcome {
    /// Whether the side effect (or its simulation) succeeded.
    pub success: bool,
    /// Structured output record; top-level fields merge into run bindings.
    pub output: Value,
    /// Human-readable log line for run histories.
    pub log: String,
    /// Whether the outcome was simulated (test mode).
    pub simulated: bool,
}

impl Outcome {
    /// A successful live outcome.
    pub fn ok(output: Value, log: impl Into<String>) -> Self {
        Self {
            success: true,
            output,
            log: log.into(),
            simulated: false,
        }
    }

    /// A failed outcome.
    pub fn failed(log: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            log: log.into(),
            simulated: false,
        }
    }

    /// A successful simulated outcome. The output is tagged so callers can
    /// distinguish simulated from real success.
    pub fn simulated(mut output: Value, log: impl Into<String>) -> Self {
        if let Value::Object(ref mut map) = output {
            map.insert("simulated".to_string(), Value::Bool(true));
        }
        Self {
            success: true,
            output,
            log: log.into(),
            simulated: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

/// Read-only map of provider name → opaque credential bundle.
///
/// The engine never mutates or refreshes credentials; acquisition is an
/// external concern.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    bundles: HashMap<String, Value>,
}

impl CredentialStore {
    /// Create an empty credential store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a bundle for a provider (builder-style, used at assembly time).
    pub fn with_provider(mut self, provider: impl Into<String>, bundle: Value) -> Self {
        self.bundles.insert(provider.into(), bundle);
        self
    }

    /// Get the bundle for a provider.
    pub fn get(&self, provider: &str) -> Option<&Value> {
        self.bundles.get(provider)
    }

    /// Whether a provider is connected.
    pub fn is_connected(&self, provider: &str) -> bool {
        self.bundles.contains_key(provider)
    }

    /// Names of all connected providers.
    pub fn providers(&self) -> Vec<&str> {
        self.bundles.keys().map(|s| s.as_str()).collect()
    }
}

/// Context handed to a connector for one invocation.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Credentials for the run's owner.
    pub credentials: Arc<CredentialStore>,
    /// Whether side effects must be simulated.
    pub test_mode: bool,
}

impl InvocationContext {
    /// Create a context.
    pub fn new(credentials: Arc<CredentialStore>, test_mode: bool) -> Self {
        Self {
            credentials,
            test_mode,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Connector Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A named, invokable side-effecting action.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The unique capability name, matching step tags and registry keys.
    fn name(&self) -> &str;

    /// Human-readable description shown to the reasoning oracle.
    fn description(&self) -> &str;

    /// Provider whose credentials this connector needs, if any.
    fn required_provider(&self) -> Option<&str> {
        None
    }

    /// One-line human summary of the side effect for approval previews,
    /// derived from already-interpolated arguments.
    fn preview(&self, _args: &Value) -> String {
        format!("Run {}", self.name())
    }

    /// Perform the real side effect. Only called outside test mode.
    async fn invoke(&self, args: Value, ctx: &InvocationContext) -> Result<Outcome>;

    /// Deterministic simulation for test mode. Must not touch the network.
    fn simulate(&self, _args: &Value) -> Outcome {
        Outcome::simulated(
            json!({ "capability": self.name() }),
            format!("[test mode] simulated {}", self.name()),
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Connector (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted connector for tests.
///
/// Returns configured outcomes in order (repeating the last one when the
/// script runs out) and records every invocation for verification.
#[derive(Debug)]
pub struct MockConnector {
    name: String,
    outcomes: std::sync::Mutex<Vec<Outcome>>,
    calls: std::sync::Mutex<Vec<Value>>,
}

impl MockConnector {
    /// Create a mock that always succeeds with an empty output.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            outcomes: std::sync::Mutex::new(Vec::new()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Script the outcomes to return, in order.
    pub fn with_outcomes(self, outcomes: Vec<Outcome>) -> Self {
        *self.outcomes.lock().unwrap() = outcomes;
        self
    }

    /// Script a single outcome returned for every call.
    pub fn with_outcome(self, outcome: Outcome) -> Self {
        self.with_outcomes(vec![outcome])
    }

    /// Arguments of every invocation made so far.
    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of invocations made so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "A scripted connector for testing"
    }

    fn preview(&self, _args: &Value) -> String {
        format!("Run {} (mock)", self.name)
    }

    async fn invoke(&self, args: Value, _ctx: &InvocationContext) -> Result<Outcome> {
        self.calls.lock().unwrap().push(args);

        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.is_empty() {
            return Ok(Outcome::ok(json!({}), "mock ok"));
        }
        if outcomes.len() == 1 {
            return Ok(outcomes[0].clone());
        }
        Ok(outcomes.remove(0))
    }

    fn simulate(&self, args: &Value) -> Outcome {
        // Mocks record simulated calls too, so tests can assert on them.
        self.calls.lock().unwrap().push(args.clone());
        Outcome::simulated(json!({}), format!("[test mode] simulated {}", self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_simulated_tags_output() {
        let outcome = Outcome::simulated(json!({"id": "x"}), "simulated");
        assert!(outcome.success);
        assert!(outcome.simulated);
        assert_eq!(outcome.output["simulated"], json!(true));
        assert_eq!(outcome.output["id"], json!("x"));
    }

    #[test]
    fn test_credential_store() {
        let store = CredentialStore::new()
            .with_provider("messaging", json!({"endpoint": "https://example.com"}));
        assert!(store.is_connected("messaging"));
        assert!(!store.is_connected("billing"));
        assert_eq!(store.providers(), vec!["messaging"]);
    }

    #[tokio::test]
    async fn test_mock_connector_scripted() {
        let mock = MockConnector::new("send_message").with_outcomes(vec![
            Outcome::failed("first fails"),
            Outcome::ok(json!({"n": 2}), "second ok"),
        ]);
        let ctx = InvocationContext::new(Arc::new(CredentialStore::new()), false);

        let first = mock.invoke(json!({"a": 1}), &ctx).await.unwrap();
        assert!(!first.success);

        let second = mock.invoke(json!({"a": 2}), &ctx).await.unwrap();
        assert!(second.success);

        // Last outcome repeats once the script runs out.
        let third = mock.invoke(json!({"a": 3}), &ctx).await.unwrap();
        assert!(third.success);

        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.calls()[0], json!({"a": 1}));
    }
}
