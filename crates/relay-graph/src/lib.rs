//! Step-graph execution with human approval gates.
//!
//! [`GraphExecutor`] walks a [`relay_types::StepGraph`] breadth-first,
//! interpolating step parameters from the accumulated bindings and
//! dispatching each step through the capability layer. Steps marked
//! `requires_approval` park behind an [`ApprovalGate`] until a human
//! resolves them; everything else keeps flowing.

pub mod error;
pub mod executor;
pub mod gate;

pub use error::{EngineError, GateError, Result};
pub use executor::{GraphConfig, GraphExecutor};
pub use gate::ApprovalGate;
