//! Connector registry.
//!
//! Maps capability names to [`Connector`] handlers. Names are validated here
//! at registration/lookup time rather than deep inside a run.

use std::collections::HashMap;
use std::sync::Arc;

use crate::connector::Connector;

/// Registry for available connectors.
#[derive(Default, Clone)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connectors: HashMap::new(),
        }
    }

    /// Register a connector. Replaces an existing connector with the same
    /// name.
    pub fn register<C: Connector + 'static>(&mut self, connector: C) {
        let name = connector.name().to_string();
        self.connectors.insert(name, Arc::new(connector));
    }

    /// Register a connector from an Arc.
    pub fn register_arc(&mut self, connector: Arc<dyn Connector>) {
        let name = connector.name().to_string();
        self.connectors.insert(name, connector);
    }

    /// Get a connector by capability name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.get(name).cloned()
    }

    /// Check if a capability is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.connectors.contains_key(name)
    }

    /// All registered capability names, sorted for stable display.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.connectors.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered connectors.
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }

    /// Iterate over registered connectors.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Connector>> {
        self.connectors.values()
    }
}

impl std::fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("connectors", &self.names())
            .finish()
    }
}
