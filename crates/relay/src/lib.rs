//! Relay is an automation execution engine with two complementary modes.
//!
//! Step graphs run a fixed plan: steps dispatch capabilities through a
//! shared connector layer, `{{placeholders}}` in step parameters fill in
//! from trigger data and upstream outputs, and steps marked for approval
//! suspend behind a gate until a human decides. Agent tasks run open-ended:
//! an oracle picks each move toward a goal inside hard safety bounds.
//!
//! ```no_run
//! use relay::{Bindings, Platform, Step, StepGraph};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), relay::EngineError> {
//! let platform = Platform::builder().build();
//!
//! let graph = StepGraph::new("welcome")
//!     .with_step(Step::new("begin", "start", "Start"))
//!     .with_step(
//!         Step::new("notify", "send_message", "Send the welcome note")
//!             .with_params(json!({"to": "{{email}}", "body": "Welcome!"})),
//!     )
//!     .with_edge("begin", "notify");
//!
//! let trigger = Bindings::from_iter([("email".to_string(), json!("ann@example.com"))]);
//! let run = platform.run_step_graph(&graph, trigger, true).await?;
//! # Ok(())
//! # }
//! ```

pub mod platform;
pub mod telemetry;

pub use platform::{Platform, PlatformBuilder};
pub use telemetry::init_tracing;

pub use relay_agent::{
    AgentConfig, AgentExecutor, CapabilityCall, MockOracle, Oracle, OracleError, OracleReply,
    OracleRequest, TaskEvent, TaskStream,
};
pub use relay_capability::{
    CapabilityError, Connector, ConnectorRegistry, CredentialStore, Dispatcher,
    DispatcherConfig, InvocationContext, MockConnector, Outcome, builtin_registry,
};
pub use relay_graph::{ApprovalGate, EngineError, GateError, GraphConfig, GraphExecutor};
pub use relay_template::{interpolate, interpolate_str};
pub use relay_types::{
    ApprovalDecision, ApprovalId, ApprovalRequest, ApprovalStatus, Bindings, CapabilityKind,
    Edge, GraphId, GraphIntegrityError, MemoryStore, Run, RunId, RunKind, RunStatus, RunStore,
    Step, StepGraph, StepRun, StepRunId, StepRunStatus, StoreError,
};
