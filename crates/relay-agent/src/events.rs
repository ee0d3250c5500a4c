//! Events emitted by an agent run.
//!
//! Consumers observe the reasoning loop through a stream of these; the
//! terminal events (`Complete`, `Escalate`, `Error`) always carry the run id
//! so callers can look the run up afterwards.

use std::pin::Pin;

use futures::Stream;
use relay_types::RunId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One observable moment in an agent run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// The oracle is being consulted for step `step`.
    Thinking { step: u32 },
    /// A capability invocation is starting.
    ToolStart {
        step: u32,
        capability: String,
        arguments: Value,
    },
    /// A capability invocation finished (or was answered from the dedup set).
    ToolResult {
        step: u32,
        capability: String,
        success: bool,
        summary: String,
        simulated: bool,
    },
    /// A progress note from the oracle.
    Message { text: String },
    /// The run finished successfully.
    Complete { run_id: RunId, summary: String },
    /// The run was handed off to a human.
    Escalate { run_id: RunId, reason: String },
    /// The run failed.
    Error { run_id: RunId, message: String },
}

impl TaskEvent {
    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Complete { .. } | Self::Escalate { .. } | Self::Error { .. }
        )
    }
}

/// Boxed stream of task events.
pub type TaskStream = Pin<Box<dyn Stream<Item = TaskEvent> + Send>>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_shape() {
        let event = TaskEvent::ToolResult {
            step: 2,
            capability: "send_message".to_string(),
            success: true,
            summary: "message sent".to_string(),
            simulated: false,
        };
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], json!("tool_result"));
        assert_eq!(wire["step"], json!(2));
        assert_eq!(wire["capability"], json!("send_message"));
    }

    #[test]
    fn test_terminal_classification() {
        let run_id = RunId::new();
        assert!(TaskEvent::Complete {
            run_id,
            summary: "ok".to_string()
        }
        .is_terminal());
        assert!(!TaskEvent::Thinking { step: 0 }.is_terminal());
    }
}
