//! Shared types for the Relay automation engine.
//!
//! This crate holds the data model every other Relay crate depends on:
//! step graphs, run records, variable bindings, and the persistence
//! boundary trait.

pub mod bindings;
pub mod graph;
pub mod ids;
pub mod run;
pub mod store;

pub use bindings::Bindings;
pub use graph::{CapabilityKind, Edge, GraphIntegrityError, Step, StepGraph};
pub use ids::{ApprovalId, GraphId, RunId, StepRunId};
pub use run::{
    AgentStepRecord, ApprovalDecision, ApprovalRequest, ApprovalStatus, Run, RunKind, RunStatus,
    StepRun, StepRunStatus,
};
pub use store::{MemoryStore, RunStore, StoreError, StoreResult};
