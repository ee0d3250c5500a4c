//! The reasoning oracle.
//!
//! The executor is deliberately ignorant of how decisions are made: it hands
//! the oracle the goal, the accumulated context, and a summarized history of
//! what has happened, and gets back one of four moves. Production oracles
//! wrap a language model; tests use [`MockOracle`].

use async_trait::async_trait;
use relay_types::Bindings;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::OracleError;

/// One capability invocation the oracle wants made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityCall {
    /// Registered capability name.
    pub capability: String,
    /// Arguments to pass, already concrete.
    pub arguments: Value,
}

impl CapabilityCall {
    /// Construct a call.
    pub fn new(capability: impl Into<String>, arguments: Value) -> Self {
        Self {
            capability: capability.into(),
            arguments,
        }
    }
}

/// The oracle's move for one reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OracleReply {
    /// Invoke one or more capabilities, in order.
    Invoke { calls: Vec<CapabilityCall> },
    /// Emit a progress note without acting.
    Message { text: String },
    /// The goal is achieved.
    Finish { summary: String },
    /// The goal cannot or should not be completed autonomously.
    Escalate { reason: String },
}

/// One completed step, summarized for the oracle's next consultation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Capability that ran, or `None` for a message step.
    pub capability: Option<String>,
    /// Arguments it ran with.
    pub arguments: Option<Value>,
    /// Whether it succeeded.
    pub success: bool,
    /// Truncated, human-readable result.
    pub summary: String,
}

impl HistoryEntry {
    /// Entry for a capability invocation.
    pub fn invocation(
        capability: impl Into<String>,
        arguments: Value,
        success: bool,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            capability: Some(capability.into()),
            arguments: Some(arguments),
            success,
            summary: summary.into(),
        }
    }

    /// Entry for a progress message.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            capability: None,
            arguments: None,
            success: true,
            summary: text.into(),
        }
    }
}

/// Everything the oracle sees when asked for its next move.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    /// The task goal, verbatim from the caller.
    pub goal: String,
    /// Accumulated bindings: trigger context plus merged step outputs.
    pub context: Bindings,
    /// Summarized history of prior steps, oldest first.
    pub history: Vec<HistoryEntry>,
    /// Capability names available for invocation.
    pub capabilities: Vec<String>,
}

/// Decision-maker for the reasoning loop.
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Decide the next move.
    async fn decide(&self, request: OracleRequest) -> Result<OracleReply, OracleError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Mock Oracle (for testing)
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted oracle for tests.
///
/// Returns configured replies in order (repeating the last one when the
/// script runs out) and records every request for verification.
#[derive(Debug, Default)]
pub struct MockOracle {
    replies: std::sync::Mutex<Vec<OracleReply>>,
    requests: std::sync::Mutex<Vec<OracleRequest>>,
}

impl MockOracle {
    /// Create a mock that always finishes immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the replies to return, in order.
    pub fn with_replies(self, replies: Vec<OracleReply>) -> Self {
        *self.replies.lock().unwrap() = replies;
        self
    }

    /// Every request made so far.
    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of consultations so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn decide(&self, request: OracleRequest) -> Result<OracleReply, OracleError> {
        self.requests.lock().unwrap().push(request);

        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            return Ok(OracleReply::Finish {
                summary: "done".to_string(),
            });
        }
        if replies.len() == 1 {
            return Ok(replies[0].clone());
        }
        Ok(replies.remove(0))
    }
}
