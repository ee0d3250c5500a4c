//! Persistence boundary for run records.
//!
//! The engine requires only create/read/update-once semantics; the storage
//! technology lives behind [`RunStore`]. [`MemoryStore`] is the in-process
//! implementation used by tests and embedded deployments. The store is the
//! single-writer boundary per run: concurrent approval resolutions serialize
//! here (first writer wins).

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use thiserror::Error;

use crate::ids::{ApprovalId, RunId, StepRunId};
use crate::run::{
    AgentStepRecord, ApprovalDecision, ApprovalRequest, ApprovalStatus, Run, StepRun,
};

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the persistence boundary.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The record id is unknown.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The approval request was already resolved by an earlier writer.
    #[error("approval request {0} is already resolved")]
    AlreadyResolved(ApprovalId),

    /// Backend failure (I/O, connection, serialization).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Create/read/update-once access to durable run records.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a newly created run.
    async fn create_run(&self, run: &Run) -> StoreResult<()>;

    /// Fetch a run by id.
    async fn get_run(&self, id: RunId) -> StoreResult<Run>;

    /// Overwrite a run's mutable fields (status, current step, reason).
    async fn update_run(&self, run: &Run) -> StoreResult<()>;

    /// Append a step-run record.
    async fn create_step_run(&self, step_run: &StepRun) -> StoreResult<()>;

    /// Fetch a step run by id.
    async fn get_step_run(&self, id: StepRunId) -> StoreResult<StepRun>;

    /// Overwrite a step run's status/output fields.
    async fn update_step_run(&self, step_run: &StepRun) -> StoreResult<()>;

    /// All step runs for a run, in creation order.
    async fn list_step_runs(&self, run_id: RunId) -> StoreResult<Vec<StepRun>>;

    /// Persist a pending approval request.
    async fn create_approval(&self, request: &ApprovalRequest) -> StoreResult<()>;

    /// Fetch an approval request by id.
    async fn get_approval(&self, id: ApprovalId) -> StoreResult<ApprovalRequest>;

    /// All approval requests for a run, oldest first.
    async fn list_approvals(&self, run_id: RunId) -> StoreResult<Vec<ApprovalRequest>>;

    /// Resolve a pending approval. Exactly-once: the first writer wins and
    /// any later attempt gets [`StoreError::AlreadyResolved`].
    async fn resolve_approval(
        &self,
        id: ApprovalId,
        decision: ApprovalDecision,
        rejection_reason: Option<String>,
    ) -> StoreResult<ApprovalRequest>;

    /// Append an agent step record.
    async fn record_agent_step(&self, record: &AgentStepRecord) -> StoreResult<()>;

    /// All agent step records for a run, in ordinal order.
    async fn list_agent_steps(&self, run_id: RunId) -> StoreResult<Vec<AgentStepRecord>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory store
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct MemoryInner {
    runs: HashMap<RunId, Run>,
    step_runs: HashMap<StepRunId, StepRun>,
    step_run_order: Vec<StepRunId>,
    approvals: HashMap<ApprovalId, ApprovalRequest>,
    agent_steps: Vec<AgentStepRecord>,
}

/// In-memory [`RunStore`] backed by a `parking_lot::RwLock`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs held, for test assertions.
    pub fn run_count(&self) -> usize {
        self.inner.read().runs.len()
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_run(&self, run: &Run) -> StoreResult<()> {
        self.inner.write().runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: RunId) -> StoreResult<Run> {
        self.inner
            .read()
            .runs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update_run(&self, run: &Run) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if !inner.runs.contains_key(&run.id) {
            return Err(StoreError::NotFound(run.id.to_string()));
        }
        inner.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn create_step_run(&self, step_run: &StepRun) -> StoreResult<()> {
        let mut inner = self.inner.write();
        inner.step_runs.insert(step_run.id, step_run.clone());
        inner.step_run_order.push(step_run.id);
        Ok(())
    }

    async fn get_step_run(&self, id: StepRunId) -> StoreResult<StepRun> {
        self.inner
            .read()
            .step_runs
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn update_step_run(&self, step_run: &StepRun) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if !inner.step_runs.contains_key(&step_run.id) {
            return Err(StoreError::NotFound(step_run.id.to_string()));
        }
        inner.step_runs.insert(step_run.id, step_run.clone());
        Ok(())
    }

    async fn list_step_runs(&self, run_id: RunId) -> StoreResult<Vec<StepRun>> {
        let inner = self.inner.read();
        Ok(inner
            .step_run_order
            .iter()
            .filter_map(|id| inner.step_runs.get(id))
            .filter(|sr| sr.run_id == run_id)
            .cloned()
            .collect())
    }

    async fn create_approval(&self, request: &ApprovalRequest) -> StoreResult<()> {
        self.inner
            .write()
            .approvals
            .insert(request.id, request.clone());
        Ok(())
    }

    async fn get_approval(&self, id: ApprovalId) -> StoreResult<ApprovalRequest> {
        self.inner
            .read()
            .approvals
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list_approvals(&self, run_id: RunId) -> StoreResult<Vec<ApprovalRequest>> {
        let mut requests: Vec<ApprovalRequest> = self
            .inner
            .read()
            .approvals
            .values()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }

    async fn resolve_approval(
        &self,
        id: ApprovalId,
        decision: ApprovalDecision,
        rejection_reason: Option<String>,
    ) -> StoreResult<ApprovalRequest> {
        let mut inner = self.inner.write();
        let request = inner
            .approvals
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        if request.status != ApprovalStatus::Pending {
            return Err(StoreError::AlreadyResolved(id));
        }

        request.status = match decision {
            ApprovalDecision::Approve => ApprovalStatus::Approved,
            ApprovalDecision::Reject => ApprovalStatus::Rejected,
        };
        request.rejection_reason = rejection_reason;
        request.resolved_at = Some(Utc::now());

        Ok(request.clone())
    }

    async fn record_agent_step(&self, record: &AgentStepRecord) -> StoreResult<()> {
        self.inner.write().agent_steps.push(record.clone());
        Ok(())
    }

    async fn list_agent_steps(&self, run_id: RunId) -> StoreResult<Vec<AgentStepRecord>> {
        let mut steps: Vec<AgentStepRecord> = self
            .inner
            .read()
            .agent_steps
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect();
        steps.sort_by_key(|r| r.ordinal);
        Ok(steps)
    }
}
