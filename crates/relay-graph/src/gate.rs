//! Approval gates.
//!
//! A gate suspends a step until a human approves or rejects it. The gate
//! itself is a thin store-backed facade: the pending request is the durable
//! artifact, and resolution is exactly-once because the store's
//! `resolve_approval` is first-writer-wins.

use std::sync::Arc;

use relay_types::{
    ApprovalDecision, ApprovalId, ApprovalRequest, RunId, RunStore, StepRun,
};
use serde_json::Value;

use crate::error::GateError;

/// Store-backed approval gate.
#[derive(Clone)]
pub struct ApprovalGate {
    store: Arc<dyn RunStore>,
}

impl ApprovalGate {
    /// Create a gate over a store.
    pub fn new(store: Arc<dyn RunStore>) -> Self {
        Self { store }
    }

    /// Open a pending request for a paused step run and persist it.
    ///
    /// `summary` is the human-readable description shown to the approver;
    /// `preview` is the exact interpolated parameters the step would run
    /// with if approved.
    pub async fn open(
        &self,
        step_run: &StepRun,
        summary: impl Into<String>,
        preview: Value,
    ) -> Result<ApprovalRequest, GateError> {
        let request =
            ApprovalRequest::pending(step_run.id, step_run.run_id, summary, preview);
        self.store
            .create_approval(&request)
            .await
            .map_err(|e| GateError::from_store(request.id, e))?;

        tracing::info!(
            approval_id = %request.id,
            run_id = %request.run_id,
            summary = %request.summary,
            "Approval requested"
        );
        Ok(request)
    }

    /// Fetch a request by id.
    pub async fn get(&self, id: ApprovalId) -> Result<ApprovalRequest, GateError> {
        self.store
            .get_approval(id)
            .await
            .map_err(|e| GateError::from_store(id, e))
    }

    /// Requests for a run that are still awaiting a decision, oldest first.
    pub async fn pending_for_run(
        &self,
        run_id: RunId,
    ) -> Result<Vec<ApprovalRequest>, GateError> {
        let requests = self
            .store
            .list_approvals(run_id)
            .await
            .map_err(|e| GateError::Store(e.to_string()))?;
        Ok(requests.into_iter().filter(|r| r.is_pending()).collect())
    }

    /// Resolve a pending request. The first resolution wins; a second call
    /// for the same request returns [`GateError::AlreadyResolved`] without
    /// touching anything.
    pub async fn resolve(
        &self,
        id: ApprovalId,
        decision: ApprovalDecision,
        rejection_reason: Option<String>,
    ) -> Result<ApprovalRequest, GateError> {
        let resolved = self
            .store
            .resolve_approval(id, decision, rejection_reason)
            .await
            .map_err(|e| GateError::from_store(id, e))?;

        tracing::info!(
            approval_id = %id,
            run_id = %resolved.run_id,
            ?decision,
            "Approval resolved"
        );
        Ok(resolved)
    }
}
