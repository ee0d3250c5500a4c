//! Static step-graph definitions.
//!
//! A [`StepGraph`] is the reusable automation description: a set of
//! [`Step`] nodes keyed by id and a set of directed [`Edge`]s. The graph is
//! data only; traversal lives in the executor crate.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::ids::GraphId;

// ─────────────────────────────────────────────────────────────────────────────
// Capability Kind
// ─────────────────────────────────────────────────────────────────────────────

/// The capability tag on a step, naming the connector that executes it.
///
/// Known kinds get a variant; anything else round-trips through
/// [`CapabilityKind::Custom`] so graphs may reference connectors registered
/// at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CapabilityKind {
    /// Graph entry point; dispatches as a no-op success.
    Start,
    /// Send a message (email, chat, SMS) through a connected provider.
    SendMessage,
    /// Pause for a fixed interval.
    Wait,
    /// Pass-through fan-out point. Edges carry no predicate today.
    Branch,
    /// Append a row to a connected record store.
    AppendRecord,
    /// Create a payment link with a connected billing provider.
    CreatePaymentLink,
    /// Query a connected record store.
    QueryStore,
    /// Any other registered connector, by name.
    Custom(String),
}

impl CapabilityKind {
    /// The wire name of this capability, matching the registry key.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::SendMessage => "send_message",
            Self::Wait => "wait",
            Self::Branch => "branch",
            Self::AppendRecord => "append_record",
            Self::CreatePaymentLink => "create_payment_link",
            Self::QueryStore => "query_store",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for CapabilityKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "start" => Self::Start,
            "send_message" => Self::SendMessage,
            "wait" => Self::Wait,
            "branch" => Self::Branch,
            "append_record" => Self::AppendRecord,
            "create_payment_link" => Self::CreatePaymentLink,
            "query_store" => Self::QueryStore,
            _ => Self::Custom(name),
        }
    }
}

impl From<CapabilityKind> for String {
    fn from(kind: CapabilityKind) -> Self {
        kind.as_str().to_string()
    }
}

impl From<&str> for CapabilityKind {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Step & Edge
// ─────────────────────────────────────────────────────────────────────────────

/// One unit of work in a step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Id, unique within the graph.
    pub id: String,
    /// The capability this step invokes.
    pub kind: CapabilityKind,
    /// Human label shown in run histories and approval summaries.
    pub label: String,
    /// Parameter record; string values may contain `{{var}}` placeholders.
    #[serde(default)]
    pub params: Value,
    /// Whether a human must approve before this step's side effect runs.
    #[serde(default)]
    pub requires_approval: bool,
}

impl Step {
    /// Create a step with empty params.
    pub fn new(id: impl Into<String>, kind: impl Into<CapabilityKind>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            label: label.into(),
            params: Value::Object(serde_json::Map::new()),
            requires_approval: false,
        }
    }

    /// Set the parameter record.
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Mark this step as approval-gated.
    pub fn with_approval(mut self) -> Self {
        self.requires_approval = true;
        self
    }

    /// Whether this step is a graph entry point.
    pub fn is_start(&self) -> bool {
        self.kind == CapabilityKind::Start
    }
}

/// A directed edge between two steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Source step id.
    pub from: String,
    /// Target step id.
    pub to: String,
}

impl Edge {
    /// Create an edge.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Graph Integrity
// ─────────────────────────────────────────────────────────────────────────────

/// Structural problems detected before any dispatch occurs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphIntegrityError {
    /// An edge references a step id that does not exist in the graph.
    #[error("edge {from} -> {to} references unknown step '{unknown}'")]
    UnknownEdgeEndpoint {
        /// Edge source.
        from: String,
        /// Edge target.
        to: String,
        /// The endpoint that failed lookup.
        unknown: String,
    },

    /// The graph has no start step, so it cannot be run.
    #[error("graph has no start step")]
    NoStartStep,

    /// Two steps share the same id.
    #[error("duplicate step id '{0}'")]
    DuplicateStepId(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Step Graph
// ─────────────────────────────────────────────────────────────────────────────

/// A static directed graph of steps. Steps are keyed by id; insertion order
/// is irrelevant to execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepGraph {
    /// Graph identity.
    pub id: GraphId,
    /// Human name for the automation.
    pub name: String,
    /// The step nodes.
    pub steps: Vec<Step>,
    /// The directed edges.
    pub edges: Vec<Edge>,
}

impl StepGraph {
    /// Create an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            steps: Vec::new(),
            edges: Vec::new(),
        }
    }

    /// Add a step.
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Add an edge.
    pub fn with_edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(Edge::new(from, to));
        self
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// All start steps (steps tagged with the `start` capability).
    pub fn start_steps(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.is_start())
    }

    /// Ids of steps reachable over outgoing edges from `step_id`.
    pub fn successors<'a>(&'a self, step_id: &'a str) -> impl Iterator<Item = &'a str> {
        self.edges
            .iter()
            .filter(move |e| e.from == step_id)
            .map(|e| e.to.as_str())
    }

    /// Validate structural invariants: unique step ids, edge endpoints exist,
    /// at least one start step. Runs before any dispatch.
    pub fn validate(&self) -> Result<(), GraphIntegrityError> {
        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id.as_str()) {
                return Err(GraphIntegrityError::DuplicateStepId(step.id.clone()));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.from, &edge.to] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(GraphIntegrityError::UnknownEdgeEndpoint {
                        from: edge.from.clone(),
                        to: edge.to.clone(),
                        unknown: endpoint.clone(),
                    });
                }
            }
        }

        if self.start_steps().next().is_none() {
            return Err(GraphIntegrityError::NoStartStep);
        }

        Ok(())
    }
}
