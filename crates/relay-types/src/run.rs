//! Durable run records.
//!
//! One [`Run`] is created per graph invocation or agent task. It owns its
//! [`StepRun`]s (graph runs) or [`AgentStepRecord`]s (agent runs), which are
//! append-only. An [`ApprovalRequest`] is owned by exactly one StepRun and
//! back-references it; resolution happens out of process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bindings::Bindings;
use crate::ids::{ApprovalId, GraphId, RunId, StepRunId};

// ─────────────────────────────────────────────────────────────────────────────
// Run
// ─────────────────────────────────────────────────────────────────────────────

/// What a run is an instantiation of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunKind {
    /// A step-graph invocation.
    Graph {
        /// The owning graph.
        graph_id: GraphId,
    },
    /// A one-off agent task.
    Agent {
        /// The natural-language goal.
        goal: String,
    },
}

/// State machine for a run.
///
/// Graph runs: `Running → {WaitingApproval, Completed, Failed}` and
/// `WaitingApproval → {Running, Failed}`. Agent runs: `Running →
/// {Completed, Escalated, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Actively executing.
    Running,
    /// Suspended at an approval gate (graph runs only).
    WaitingApproval,
    /// All reachable work finished successfully. Terminal.
    Completed,
    /// The agent needs a human to supply missing input. Terminal for the
    /// engine; a human may start a follow-up task.
    Escalated,
    /// A step failed, an approval was rejected, or a safety bound was hit.
    /// Terminal.
    Failed,
}

impl RunStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Escalated | Self::Failed)
    }
}

/// One instantiation of a graph or goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Run identity.
    pub id: RunId,
    /// What this run executes.
    pub kind: RunKind,
    /// Current status.
    pub status: RunStatus,
    /// The trigger data the run started with.
    pub trigger: Bindings,
    /// The step currently executing or paused, if any.
    pub current_step: Option<String>,
    /// Whether side effects are simulated.
    pub test_mode: bool,
    /// Failure reason when status is `Failed`.
    pub failure_reason: Option<String>,
    /// When the run was created.
    pub created_at: DateTime<Utc>,
    /// When the run last changed.
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Create a new running graph run.
    pub fn graph(graph_id: GraphId, trigger: Bindings, test_mode: bool) -> Self {
        Self::new(RunKind::Graph { graph_id }, trigger, test_mode)
    }

    /// Create a new running agent run.
    pub fn agent(goal: impl Into<String>, trigger: Bindings, test_mode: bool) -> Self {
        Self::new(RunKind::Agent { goal: goal.into() }, trigger, test_mode)
    }

    fn new(kind: RunKind, trigger: Bindings, test_mode: bool) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            kind,
            status: RunStatus::Running,
            trigger,
            current_step: None,
            test_mode,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Transition to a new status.
    pub fn set_status(&mut self, status: RunStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    /// Mark the run failed with a reason.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.failure_reason = Some(reason.into());
        self.set_status(RunStatus::Failed);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StepRun
// ─────────────────────────────────────────────────────────────────────────────

/// Status of one step execution. Transitions to a terminal status exactly
/// once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRunStatus {
    /// Dispatch in progress.
    Running,
    /// Paused behind a pending approval.
    WaitingApproval,
    /// Dispatch succeeded. Terminal.
    Completed,
    /// Dispatch failed or approval was rejected. Terminal.
    Failed,
}

/// One record per step execution within a run. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRun {
    /// Record identity.
    pub id: StepRunId,
    /// Owning run.
    pub run_id: RunId,
    /// The graph step this executed.
    pub step_id: String,
    /// The capability tag, denormalized for history display.
    pub capability: String,
    /// Current status.
    pub status: StepRunStatus,
    /// Bindings snapshot at the moment this step was reached. Resume
    /// re-dispatches from exactly this snapshot.
    pub input: Bindings,
    /// Interpolated parameters handed to the dispatcher.
    pub params: Value,
    /// Dispatcher output, once completed.
    pub output: Value,
    /// Free-text log from the dispatcher.
    pub log: String,
    /// When this step started.
    pub started_at: DateTime<Utc>,
    /// When this step reached a terminal status.
    pub finished_at: Option<DateTime<Utc>>,
}

impl StepRun {
    /// Create a running step-run record.
    pub fn start(run_id: RunId, step_id: impl Into<String>, capability: impl Into<String>, input: Bindings, params: Value) -> Self {
        Self {
            id: StepRunId::new(),
            run_id,
            step_id: step_id.into(),
            capability: capability.into(),
            status: StepRunStatus::Running,
            input,
            params,
            output: Value::Null,
            log: String::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Mark completed with the dispatcher's output and log.
    pub fn complete(&mut self, output: Value, log: impl Into<String>) {
        self.status = StepRunStatus::Completed;
        self.output = output;
        self.log = log.into();
        self.finished_at = Some(Utc::now());
    }

    /// Mark failed with the dispatcher's log.
    pub fn fail(&mut self, log: impl Into<String>) {
        self.status = StepRunStatus::Failed;
        self.log = log.into();
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration, once finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ApprovalRequest
// ─────────────────────────────────────────────────────────────────────────────

/// Resolution state of an approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Awaiting a human decision.
    Pending,
    /// Approved; the gated step may dispatch.
    Approved,
    /// Rejected; the run fails without dispatching.
    Rejected,
}

/// The human decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    /// Allow the side effect.
    Approve,
    /// Block the side effect and fail the run.
    Reject,
}

/// A pending human decision tied 1:1 to a paused step run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Request identity.
    pub id: ApprovalId,
    /// The paused step run (weak back-reference; resolution happens
    /// out of process).
    pub step_run_id: StepRunId,
    /// Owning run, for lookup convenience.
    pub run_id: RunId,
    /// Human-readable summary of the side effect, e.g. "Send a message to X".
    pub summary: String,
    /// Structured preview of the interpolated parameters about to be sent.
    pub preview: Value,
    /// Resolution state. Mutated exactly once, by an external actor.
    pub status: ApprovalStatus,
    /// Reason supplied on rejection.
    pub rejection_reason: Option<String>,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalRequest {
    /// Construct a pending request. Persisting it is the caller's job.
    pub fn pending(step_run_id: StepRunId, run_id: RunId, summary: impl Into<String>, preview: Value) -> Self {
        Self {
            id: ApprovalId::new(),
            step_run_id,
            run_id,
            summary: summary.into(),
            preview,
            status: ApprovalStatus::Pending,
            rejection_reason: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Whether the request is still pending.
    pub fn is_pending(&self) -> bool {
        self.status == ApprovalStatus::Pending
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentStepRecord
// ─────────────────────────────────────────────────────────────────────────────

/// One capability invocation by the reasoning loop. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStepRecord {
    /// Owning run.
    pub run_id: RunId,
    /// Ordinal step counter within the run (monotonically increasing).
    pub ordinal: u32,
    /// Capability name that was invoked.
    pub capability: String,
    /// The arguments given by the oracle.
    pub arguments: Value,
    /// Whether the dispatch succeeded.
    pub success: bool,
    /// Structured output from the dispatcher.
    pub output: Value,
    /// Whether the outcome was simulated (test mode).
    pub simulated: bool,
    /// Dedup key for this invocation, kept durable so an abandoned run can
    /// resume without repeating side effects.
    pub dedup_key: String,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}
