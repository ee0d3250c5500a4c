//! Graph executor errors.

use relay_types::{ApprovalId, GraphIntegrityError, RunId, RunStatus, StoreError};
use thiserror::Error;

/// Errors from the graph executor itself.
///
/// Capability failures are not represented here: a failed dispatch is a
/// failed `Run`, not an `Err`. These are the infrastructure failures that
/// prevent a run from being executed or recorded at all.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The graph failed structural validation.
    #[error("invalid graph: {0}")]
    InvalidGraph(#[from] GraphIntegrityError),

    /// A step names a capability no connector is registered for.
    #[error("step '{step_id}' uses unknown capability '{capability}'")]
    UnknownCapability {
        step_id: String,
        capability: String,
    },

    /// The graph supplied for a resume is not the one the run started with.
    #[error("run belongs to graph {expected}, not {got}")]
    WrongGraph {
        expected: relay_types::GraphId,
        got: relay_types::GraphId,
    },

    /// The run already settled; terminal statuses have no outgoing
    /// transitions, so its leftover approvals cannot be resumed.
    #[error("run {run_id} already settled as {status:?}")]
    RunFinished { run_id: RunId, status: RunStatus },

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Approval resolution failed.
    #[error(transparent)]
    Gate(#[from] GateError),
}

/// Errors surfaced to whoever resolves an approval.
#[derive(Debug, Error)]
pub enum GateError {
    /// No approval request with that id.
    #[error("approval request {0} not found")]
    NotFound(ApprovalId),

    /// The request was already approved or rejected.
    #[error("approval request {0} was already resolved")]
    AlreadyResolved(ApprovalId),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(String),
}

impl GateError {
    /// Map a store failure for a specific request id. The store reports ids
    /// as opaque strings; the gate knows which request it was asking about.
    pub fn from_store(id: ApprovalId, e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => GateError::NotFound(id),
            StoreError::AlreadyResolved(id) => GateError::AlreadyResolved(id),
            StoreError::Backend(msg) => GateError::Store(msg),
        }
    }
}

/// Convenience alias for executor results.
pub type Result<T> = std::result::Result<T, EngineError>;
