//! Step-graph executor.
//!
//! Runs a validated [`StepGraph`] with a breadth-first worklist: start steps
//! seed the queue, each completed step enqueues its successors, and the run
//! finishes when the queue drains. Steps marked `requires_approval` suspend
//! their branch behind an [`ApprovalGate`] while sibling branches keep
//! executing; `resume_approval` picks the branch back up from the step run's
//! captured snapshot.
//!
//! A failed dispatch fails the whole run and drops everything still queued.
//! Final status precedence is failed, then waiting for approval, then
//! completed.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use relay_capability::{CredentialStore, Dispatcher};
use relay_template::interpolate;
use relay_types::{
    ApprovalDecision, ApprovalId, Bindings, Run, RunKind, RunStatus, RunStore, StepGraph,
    StepRun, StepRunStatus,
};

use crate::error::{EngineError, GateError, Result};
use crate::gate::ApprovalGate;

/// Tuning knobs for the graph executor.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Actor name injected into the base binding context.
    pub actor: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            actor: "relay".to_string(),
        }
    }
}

impl GraphConfig {
    /// Set the actor name.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }
}

/// What drain() observed, folded into the run's final status.
#[derive(Debug, Default)]
struct TraversalResult {
    failure: Option<String>,
    waiting: bool,
}

/// Executes step graphs against a dispatcher and a store.
#[derive(Clone)]
pub struct GraphExecutor {
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn RunStore>,
    gate: ApprovalGate,
    credentials: Arc<CredentialStore>,
    config: GraphConfig,
}

impl GraphExecutor {
    /// Create an executor.
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn RunStore>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let gate = ApprovalGate::new(store.clone());
        Self {
            dispatcher,
            store,
            gate,
            credentials,
            config: GraphConfig::default(),
        }
    }

    /// Override the default configuration.
    pub fn with_config(mut self, config: GraphConfig) -> Self {
        self.config = config;
        self
    }

    /// The approval gate backing this executor.
    pub fn gate(&self) -> &ApprovalGate {
        &self.gate
    }

    /// Execute a graph from its start steps to quiescence.
    ///
    /// Returns the run in its final state: `Completed`, `Failed`, or
    /// `WaitingApproval` when at least one branch is suspended behind a
    /// gate. Capability failures never surface as `Err`; they fail the run.
    pub async fn run(
        &self,
        graph: &StepGraph,
        trigger: Bindings,
        test_mode: bool,
    ) -> Result<Run> {
        graph.validate()?;
        self.check_capabilities(graph)?;

        let mut run = Run::graph(graph.id, trigger.clone(), test_mode);
        self.store.create_run(&run).await?;

        tracing::info!(
            run_id = %run.id,
            graph = %graph.name,
            test_mode,
            "Graph run started"
        );

        let mut bindings = Bindings::base_context(&self.config.actor, Utc::now());
        bindings.merge(&trigger);

        // each entry carries its own bindings snapshot so sibling branches
        // stay independent, as a fork should
        let worklist: VecDeque<(String, Bindings)> = graph
            .start_steps()
            .map(|s| (s.id.clone(), bindings.clone()))
            .collect();

        let result = self.drain(graph, &mut run, worklist).await?;
        self.finish(&mut run, result).await?;
        Ok(run)
    }

    /// Resolve an approval request and, on approval, resume its branch.
    ///
    /// The rejected path fails the run without dispatching anything. The
    /// approved path re-dispatches the suspended step from the parameters
    /// captured when it paused, then continues through its successors. A
    /// second resolution of the same request fails with `AlreadyResolved`,
    /// and a request left over from a run that already settled fails with
    /// `RunFinished`; neither touches any state.
    pub async fn resume_approval(
        &self,
        graph: &StepGraph,
        request_id: ApprovalId,
        decision: ApprovalDecision,
        rejection_reason: Option<String>,
    ) -> Result<Run> {
        let request = self.gate.get(request_id).await?;
        if !request.is_pending() {
            return Err(GateError::AlreadyResolved(request.id).into());
        }
        let mut run = self.store.get_run(request.run_id).await?;

        if let RunKind::Graph { graph_id } = run.kind
            && graph_id != graph.id
        {
            return Err(EngineError::WrongGraph {
                expected: graph_id,
                got: graph.id,
            });
        }

        // Failed and Completed have no outgoing transitions; a leftover
        // request from a run a sibling branch already failed stays pending
        // but can never dispatch anything.
        if run.status.is_terminal() {
            return Err(EngineError::RunFinished {
                run_id: run.id,
                status: run.status,
            });
        }

        let resolved = self
            .gate
            .resolve(request_id, decision, rejection_reason)
            .await?;
        let mut step_run = self.store.get_step_run(resolved.step_run_id).await?;

        if decision == ApprovalDecision::Reject {
            let reason = resolved
                .rejection_reason
                .clone()
                .unwrap_or_else(|| "rejected".to_string());
            step_run.fail(format!("approval rejected: {reason}"));
            self.store.update_step_run(&step_run).await?;
            run.fail(format!(
                "step '{}' rejected: {reason}",
                step_run.step_id
            ));
            self.store.update_run(&run).await?;
            tracing::info!(run_id = %run.id, step = %step_run.step_id, "Run rejected at gate");
            return Ok(run);
        }

        run.set_status(RunStatus::Running);
        self.store.update_run(&run).await?;

        // Re-dispatch from the snapshot taken when the step paused; edits to
        // the trigger or graph since then do not affect this branch.
        let mut bindings = step_run.input.clone();
        step_run.status = StepRunStatus::Running;

        let outcome = self
            .dispatcher
            .invoke(
                &step_run.capability,
                step_run.params.clone(),
                self.credentials.clone(),
                run.test_mode,
            )
            .await;

        let mut result = if outcome.success {
            bindings.merge_object(&outcome.output);
            step_run.complete(outcome.output, outcome.log);
            self.store.update_step_run(&step_run).await?;

            let worklist: VecDeque<(String, Bindings)> = graph
                .successors(&step_run.step_id)
                .map(|next| (next.to_string(), bindings.clone()))
                .collect();
            self.drain(graph, &mut run, worklist).await?
        } else {
            step_run.fail(outcome.log.clone());
            self.store.update_step_run(&step_run).await?;
            TraversalResult {
                failure: Some(format!(
                    "step '{}' failed: {}",
                    step_run.step_id, outcome.log
                )),
                waiting: false,
            }
        };

        // another branch of the same run may still be parked at its own gate
        if result.failure.is_none()
            && !self.gate.pending_for_run(run.id).await?.is_empty()
        {
            result.waiting = true;
        }

        self.finish(&mut run, result).await?;
        Ok(run)
    }

    /// Every step's capability must have a registered connector.
    fn check_capabilities(&self, graph: &StepGraph) -> Result<()> {
        for step in &graph.steps {
            let capability = step.kind.as_str();
            if !self.dispatcher.registry().contains(capability) {
                return Err(EngineError::UnknownCapability {
                    step_id: step.id.clone(),
                    capability: capability.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Drain the worklist. Gated steps suspend their branch; a failed
    /// dispatch drops the rest of the queue.
    async fn drain(
        &self,
        graph: &StepGraph,
        run: &mut Run,
        mut worklist: VecDeque<(String, Bindings)>,
    ) -> Result<TraversalResult> {
        let mut result = TraversalResult::default();

        while let Some((step_id, mut bindings)) = worklist.pop_front() {
            // validate() guarantees edges point at real steps
            let Some(step) = graph.step(&step_id) else {
                continue;
            };
            let capability = step.kind.as_str();

            run.current_step = Some(step_id.clone());
            self.store.update_run(run).await?;

            let params = interpolate(&step.params, &bindings);
            let mut step_run = StepRun::start(
                run.id,
                &step_id,
                capability,
                bindings.clone(),
                params.clone(),
            );

            if step.requires_approval {
                step_run.status = StepRunStatus::WaitingApproval;
                self.store.create_step_run(&step_run).await?;

                let mut summary = self.dispatcher.preview(capability, &params);
                if run.test_mode {
                    summary = format!("[simulated] {summary}");
                }
                self.gate.open(&step_run, summary, params).await?;

                result.waiting = true;
                continue;
            }

            self.store.create_step_run(&step_run).await?;

            tracing::debug!(
                run_id = %run.id,
                step = %step_id,
                capability,
                "Dispatching step"
            );

            let outcome = self
                .dispatcher
                .invoke(
                    capability,
                    params,
                    self.credentials.clone(),
                    run.test_mode,
                )
                .await;

            if outcome.success {
                bindings.merge_object(&outcome.output);
                step_run.complete(outcome.output, outcome.log);
                self.store.update_step_run(&step_run).await?;

                for next in graph.successors(&step_id) {
                    worklist.push_back((next.to_string(), bindings.clone()));
                }
            } else {
                tracing::warn!(
                    run_id = %run.id,
                    step = %step_id,
                    log = %outcome.log,
                    "Step failed; abandoning remaining work"
                );
                step_run.fail(outcome.log.clone());
                self.store.update_step_run(&step_run).await?;

                result.failure =
                    Some(format!("step '{step_id}' failed: {}", outcome.log));
                worklist.clear();
            }
        }

        Ok(result)
    }

    /// Fold the traversal result into the run's final status and persist it.
    async fn finish(&self, run: &mut Run, result: TraversalResult) -> Result<()> {
        if let Some(reason) = result.failure {
            run.fail(reason);
            run.current_step = None;
        } else if result.waiting {
            run.set_status(RunStatus::WaitingApproval);
        } else {
            run.set_status(RunStatus::Completed);
            run.current_step = None;
        }
        self.store.update_run(run).await?;

        tracing::info!(run_id = %run.id, status = ?run.status, "Graph run settled");
        Ok(())
    }
}
