//! The capability dispatcher.
//!
//! Uniform entry point for invoking a named capability. All I/O-bound,
//! fallible, rate-limited work funnels through here; the dispatcher enforces
//! per-call timeouts, routes test mode to simulation, and converts every
//! internal failure into a returned [`Outcome`]; it never raises past this
//! boundary.

use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::connector::{CredentialStore, InvocationContext, Outcome};
use crate::registry::ConnectorRegistry;

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Per-invocation timeout. A timeout is an ordinary dispatch failure.
    pub call_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl DispatcherConfig {
    /// Set the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

/// Dispatches capability invocations against registered connectors.
pub struct Dispatcher {
    registry: Arc<ConnectorRegistry>,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Create a dispatcher over a registry.
    pub fn new(registry: ConnectorRegistry, config: DispatcherConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &ConnectorRegistry {
        &self.registry
    }

    /// Human preview of the side effect a capability would perform, for
    /// approval summaries. Falls back to the capability name if unregistered.
    pub fn preview(&self, capability: &str, args: &Value) -> String {
        match self.registry.get(capability) {
            Some(connector) => connector.preview(args),
            None => format!("Run {capability}"),
        }
    }

    /// Invoke a capability.
    ///
    /// In test mode the connector's deterministic simulation runs instead of
    /// the real side effect, and the outcome is tagged `simulated`. Network,
    /// credential, and provider errors, timeouts included, all come back as
    /// `success: false` with a human-readable log.
    pub async fn invoke(
        &self,
        capability: &str,
        args: Value,
        credentials: Arc<CredentialStore>,
        test_mode: bool,
    ) -> Outcome {
        let Some(connector) = self.registry.get(capability) else {
            tracing::warn!(capability, "Dispatch to unknown capability");
            return Outcome::failed(format!("unknown capability '{capability}'"));
        };

        if test_mode {
            tracing::debug!(capability, "Dispatch simulated (test mode)");
            return connector.simulate(&args);
        }

        let ctx = InvocationContext::new(credentials, false);
        let started = Instant::now();

        let outcome =
            match tokio::time::timeout(self.config.call_timeout, connector.invoke(args, &ctx))
                .await
            {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(e)) => {
                    tracing::warn!(capability, error = %e, "Dispatch failed");
                    Outcome::failed(e.to_string())
                }
                Err(_) => {
                    tracing::warn!(
                        capability,
                        timeout_secs = self.config.call_timeout.as_secs(),
                        "Dispatch timed out"
                    );
                    Outcome::failed(format!(
                        "capability '{}' timed out after {}s",
                        capability,
                        self.config.call_timeout.as_secs()
                    ))
                }
            };

        tracing::debug!(
            capability,
            success = outcome.success,
            duration_ms = started.elapsed().as_millis() as u64,
            "Dispatch completed"
        );

        outcome
    }
}
