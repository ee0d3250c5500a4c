//! Bounded reasoning-loop executor.
//!
//! Consults the oracle, dispatches the capabilities it asks for, and feeds
//! summarized results back, until the oracle finishes or escalates, or a
//! safety bound trips. The bounds are hard: a step ceiling, a consecutive-
//! failure circuit breaker, an oracle deadline, and run-scoped dedup so the
//! same side effect never happens twice.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use relay_capability::{CredentialStore, Dispatcher, Outcome};
use relay_types::{AgentStepRecord, Bindings, Run, RunStatus, RunStore};
use tokio_util::sync::CancellationToken;

use crate::dedup::{DedupSet, dedup_key};
use crate::error::OracleError;
use crate::events::{TaskEvent, TaskStream};
use crate::oracle::{HistoryEntry, Oracle, OracleReply, OracleRequest};

/// Longest result summary fed back to the oracle or emitted in events.
const MAX_SUMMARY_CHARS: usize = 500;

/// Safety bounds for the reasoning loop.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Hard ceiling on oracle consultations per run.
    pub max_steps: u32,
    /// Consecutive dispatch failures that trip the circuit breaker.
    pub failure_threshold: u32,
    /// Deadline for each oracle consultation.
    pub oracle_timeout: Duration,
    /// Actor name injected into the base binding context.
    pub actor: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            failure_threshold: 3,
            oracle_timeout: Duration::from_secs(120),
            actor: "relay".to_string(),
        }
    }
}

impl AgentConfig {
    /// Set the step ceiling.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Set the consecutive-failure threshold.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the oracle deadline.
    pub fn with_oracle_timeout(mut self, timeout: Duration) -> Self {
        self.oracle_timeout = timeout;
        self
    }
}

/// Runs agent tasks against an oracle, a dispatcher, and a store.
#[derive(Clone)]
pub struct AgentExecutor {
    oracle: Arc<dyn Oracle>,
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn RunStore>,
    credentials: Arc<CredentialStore>,
    config: AgentConfig,
}

impl AgentExecutor {
    /// Create an executor.
    pub fn new(
        oracle: Arc<dyn Oracle>,
        dispatcher: Arc<Dispatcher>,
        store: Arc<dyn RunStore>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        Self {
            oracle,
            dispatcher,
            store,
            credentials,
            config: AgentConfig::default(),
        }
    }

    /// Override the default bounds.
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Start a task and stream its events.
    ///
    /// The stream always ends with exactly one terminal event carrying the
    /// run id. Cancelling the token fails the run at the next step boundary;
    /// an in-flight dispatch is allowed to finish and be recorded first.
    pub fn run(
        &self,
        goal: impl Into<String>,
        context: Bindings,
        test_mode: bool,
        cancel: CancellationToken,
    ) -> TaskStream {
        let goal = goal.into();
        let oracle = self.oracle.clone();
        let dispatcher = self.dispatcher.clone();
        let store = self.store.clone();
        let credentials = self.credentials.clone();
        let config = self.config.clone();

        Box::pin(async_stream::stream! {
            let mut run = Run::agent(goal.clone(), context.clone(), test_mode);
            let run_id = run.id;

            if let Err(e) = store.create_run(&run).await {
                yield TaskEvent::Error { run_id, message: e.to_string() };
                return;
            }

            tracing::info!(%run_id, goal = %goal, test_mode, "Agent run started");

            // simulated runs can use any connector; live runs only the ones
            // whose provider is actually connected
            let mut capabilities: Vec<String> = dispatcher
                .registry()
                .iter()
                .filter(|c| {
                    test_mode
                        || c.required_provider()
                            .is_none_or(|p| credentials.is_connected(p))
                })
                .map(|c| c.name().to_string())
                .collect();
            capabilities.sort_unstable();

            let mut bindings = Bindings::base_context(&config.actor, Utc::now());
            bindings.merge(&context);

            let mut history: Vec<HistoryEntry> = Vec::new();
            let mut dedup = DedupSet::new();
            let mut consecutive_failures: u32 = 0;
            let mut ordinal: u32 = 0;
            // set when a bound trips; the loop exits and the tail yields
            // exactly one Error event
            let mut failure: Option<String> = None;

            'steps: for step in 0..config.max_steps {
                if cancel.is_cancelled() {
                    failure = Some("cancelled".to_string());
                    break 'steps;
                }

                yield TaskEvent::Thinking { step };

                let request = OracleRequest {
                    goal: goal.clone(),
                    context: bindings.clone(),
                    history: history.clone(),
                    capabilities: capabilities.clone(),
                };

                let reply = match tokio::time::timeout(
                    config.oracle_timeout,
                    oracle.decide(request),
                )
                .await
                {
                    Ok(Ok(reply)) => reply,
                    Ok(Err(e)) => {
                        failure = Some(format!("oracle error: {e}"));
                        break 'steps;
                    }
                    Err(_) => {
                        let e = OracleError::Timeout(config.oracle_timeout.as_secs());
                        failure = Some(e.to_string());
                        break 'steps;
                    }
                };

                match reply {
                    OracleReply::Message { text } => {
                        history.push(HistoryEntry::message(text.clone()));
                        yield TaskEvent::Message { text };
                    }

                    OracleReply::Finish { summary } => {
                        run.set_status(RunStatus::Completed);
                        if let Err(e) = store.update_run(&run).await {
                            tracing::warn!(%run_id, error = %e, "Failed to persist terminal status");
                        }
                        tracing::info!(%run_id, steps = step, "Agent run completed");
                        yield TaskEvent::Complete { run_id, summary };
                        return;
                    }

                    OracleReply::Escalate { reason } => {
                        run.set_status(RunStatus::Escalated);
                        if let Err(e) = store.update_run(&run).await {
                            tracing::warn!(%run_id, error = %e, "Failed to persist terminal status");
                        }
                        tracing::info!(%run_id, reason = %reason, "Agent run escalated");
                        yield TaskEvent::Escalate { run_id, reason };
                        return;
                    }

                    OracleReply::Invoke { calls } => {
                        for call in calls {
                            let key = dedup_key(&call.capability, &call.arguments);

                            if dedup.contains(&key) {
                                // already done this exact side effect; answer
                                // from memory instead of repeating it
                                let summary = format!(
                                    "{} was already completed with these arguments",
                                    call.capability
                                );
                                tracing::debug!(
                                    %run_id,
                                    capability = %call.capability,
                                    "Duplicate call suppressed"
                                );
                                history.push(HistoryEntry::invocation(
                                    &call.capability,
                                    call.arguments,
                                    true,
                                    summary.clone(),
                                ));
                                yield TaskEvent::ToolResult {
                                    step,
                                    capability: call.capability,
                                    success: true,
                                    summary,
                                    simulated: false,
                                };
                                continue;
                            }

                            yield TaskEvent::ToolStart {
                                step,
                                capability: call.capability.clone(),
                                arguments: call.arguments.clone(),
                            };

                            let outcome = dispatcher
                                .invoke(
                                    &call.capability,
                                    call.arguments.clone(),
                                    credentials.clone(),
                                    test_mode,
                                )
                                .await;

                            ordinal += 1;
                            let record = AgentStepRecord {
                                run_id,
                                ordinal,
                                capability: call.capability.clone(),
                                arguments: call.arguments.clone(),
                                success: outcome.success,
                                output: outcome.output.clone(),
                                simulated: outcome.simulated,
                                dedup_key: key.clone(),
                                created_at: Utc::now(),
                            };
                            // the record must be durable before the result
                            // influences anything else
                            if let Err(e) = store.record_agent_step(&record).await {
                                failure = Some(format!("store error: {e}"));
                                break 'steps;
                            }

                            if outcome.success {
                                consecutive_failures = 0;
                                dedup.insert(key);
                                bindings.merge_object(&outcome.output);
                            } else {
                                consecutive_failures += 1;
                            }

                            let summary = summarize(&outcome);
                            history.push(HistoryEntry::invocation(
                                &call.capability,
                                call.arguments,
                                outcome.success,
                                summary.clone(),
                            ));
                            yield TaskEvent::ToolResult {
                                step,
                                capability: call.capability,
                                success: outcome.success,
                                summary,
                                simulated: outcome.simulated,
                            };

                            if consecutive_failures >= config.failure_threshold {
                                failure = Some(format!(
                                    "{consecutive_failures} consecutive capability failures"
                                ));
                                break 'steps;
                            }
                        }
                    }
                }
            }

            let reason = failure.unwrap_or_else(|| {
                format!(
                    "reached the maximum of {} steps without finishing",
                    config.max_steps
                )
            });
            run.fail(reason.clone());
            if let Err(e) = store.update_run(&run).await {
                tracing::warn!(%run_id, error = %e, "Failed to persist terminal status");
            }
            tracing::warn!(%run_id, reason = %reason, "Agent run failed");
            yield TaskEvent::Error { run_id, message: reason };
        })
    }
}

/// Shorten an outcome into a line the oracle (and a human) can read.
fn summarize(outcome: &Outcome) -> String {
    let mut text = if outcome.log.is_empty() {
        outcome.output.to_string()
    } else {
        outcome.log.clone()
    };

    if text.chars().count() > MAX_SUMMARY_CHARS {
        text = text.chars().take(MAX_SUMMARY_CHARS).collect::<String>() + "…";
    }

    if outcome.simulated && !text.starts_with("[simulated]") {
        text = format!("[simulated] {text}");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{CapabilityCall, MockOracle};
    use async_trait::async_trait;
    use futures::StreamExt;
    use relay_capability::{ConnectorRegistry, DispatcherConfig, MockConnector};
    use relay_types::MemoryStore;
    use serde_json::json;

    struct Harness {
        executor: AgentExecutor,
        store: Arc<MemoryStore>,
        mocks: Vec<Arc<MockConnector>>,
    }

    fn harness(oracle: impl Oracle + 'static, mocks: Vec<MockConnector>) -> Harness {
        let mut registry = ConnectorRegistry::new();
        let mocks: Vec<Arc<MockConnector>> = mocks.into_iter().map(Arc::new).collect();
        for mock in &mocks {
            registry.register_arc(mock.clone());
        }
        let dispatcher = Arc::new(Dispatcher::new(registry, DispatcherConfig::default()));
        let store = Arc::new(MemoryStore::new());
        let executor = AgentExecutor::new(
            Arc::new(oracle),
            dispatcher,
            store.clone(),
            Arc::new(CredentialStore::new()),
        );
        Harness {
            executor,
            store,
            mocks,
        }
    }

    async fn collect(h: &Harness, test_mode: bool) -> Vec<TaskEvent> {
        h.executor
            .run("test goal", Bindings::new(), test_mode, CancellationToken::new())
            .collect()
            .await
    }

    fn run_id_of(events: &[TaskEvent]) -> relay_types::RunId {
        match events.last().unwrap() {
            TaskEvent::Complete { run_id, .. }
            | TaskEvent::Escalate { run_id, .. }
            | TaskEvent::Error { run_id, .. } => *run_id,
            other => panic!("stream ended on non-terminal event: {other:?}"),
        }
    }

    fn invoke(capability: &str, arguments: serde_json::Value) -> OracleReply {
        OracleReply::Invoke {
            calls: vec![CapabilityCall::new(capability, arguments)],
        }
    }

    fn finish() -> OracleReply {
        OracleReply::Finish {
            summary: "done".to_string(),
        }
    }

    #[tokio::test]
    async fn test_immediate_finish() {
        let h = harness(MockOracle::new().with_replies(vec![finish()]), vec![]);
        let events = collect(&h, false).await;

        assert!(matches!(events[0], TaskEvent::Thinking { step: 0 }));
        assert!(matches!(events.last().unwrap(), TaskEvent::Complete { .. }));

        let run = h.store.get_run(run_id_of(&events)).await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_invoke_then_finish_records_step() {
        let oracle = MockOracle::new().with_replies(vec![
            invoke("send_message", json!({"to": "a@b.com"})),
            finish(),
        ]);
        let h = harness(oracle, vec![MockConnector::new("send_message")]);
        let events = collect(&h, false).await;

        let kinds: Vec<&str> = events
            .iter()
            .map(|e| match e {
                TaskEvent::Thinking { .. } => "thinking",
                TaskEvent::ToolStart { .. } => "tool_start",
                TaskEvent::ToolResult { .. } => "tool_result",
                TaskEvent::Message { .. } => "message",
                TaskEvent::Complete { .. } => "complete",
                TaskEvent::Escalate { .. } => "escalate",
                TaskEvent::Error { .. } => "error",
            })
            .collect();
        assert_eq!(
            kinds,
            ["thinking", "tool_start", "tool_result", "thinking", "complete"]
        );

        let records = h.store.list_agent_steps(run_id_of(&events)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ordinal, 1);
        assert_eq!(records[0].capability, "send_message");
        assert!(records[0].success);
        assert_eq!(h.mocks[0].call_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_call_not_dispatched_again() {
        let oracle = MockOracle::new().with_replies(vec![
            invoke("send_message", json!({"to": "a@b.com", "body": "hi"})),
            // same call again, different key order
            invoke("send_message", json!({"body": "hi", "to": "a@b.com"})),
            finish(),
        ]);
        let h = harness(oracle, vec![MockConnector::new("send_message")]);
        let events = collect(&h, false).await;

        // the side effect happened once; the repeat was answered from memory
        assert_eq!(h.mocks[0].call_count(), 1);
        let records = h.store.list_agent_steps(run_id_of(&events)).await.unwrap();
        assert_eq!(records.len(), 1);

        let repeat = events
            .iter()
            .filter_map(|e| match e {
                TaskEvent::ToolResult { summary, .. } => Some(summary.as_str()),
                _ => None,
            })
            .nth(1)
            .unwrap();
        assert!(repeat.contains("already completed"));
    }

    #[tokio::test]
    async fn test_failure_circuit_breaker() {
        let oracle = MockOracle::new().with_replies(vec![invoke(
            "send_message",
            json!({"to": "a@b.com"}),
        )]);
        let h = harness(
            oracle,
            vec![MockConnector::new("send_message")
                .with_outcome(relay_capability::Outcome::failed("provider down"))],
        );
        let events = collect(&h, false).await;

        match events.last().unwrap() {
            TaskEvent::Error { message, .. } => {
                assert!(message.contains("3 consecutive"));
            }
            other => panic!("expected error, got {other:?}"),
        }
        // failed dispatches never enter the dedup set, so each retry really
        // dispatched
        assert_eq!(h.mocks[0].call_count(), 3);

        let run = h.store.get_run(run_id_of(&events)).await.unwrap();
        assert_eq!(run.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_success_resets_failure_counter() {
        let oracle = MockOracle::new().with_replies(vec![
            invoke("send_message", json!({"to": "a"})),
            invoke("send_message", json!({"to": "b"})),
            invoke("send_message", json!({"to": "c"})),
            finish(),
        ]);
        let h = harness(
            oracle,
            vec![MockConnector::new("send_message").with_outcomes(vec![
                relay_capability::Outcome::failed("flaky"),
                relay_capability::Outcome::ok(json!({}), "ok"),
                relay_capability::Outcome::failed("flaky"),
            ])],
        );
        let events = collect(&h, false).await;

        // fail, success, fail: never two consecutive, so the run completes
        assert!(matches!(events.last().unwrap(), TaskEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn test_step_ceiling() {
        let oracle = MockOracle::new().with_replies(vec![OracleReply::Message {
            text: "still thinking".to_string(),
        }]);
        let h = harness(oracle, vec![]);
        let h = Harness {
            executor: h.executor.clone().with_config(AgentConfig::default().with_max_steps(4)),
            store: h.store,
            mocks: h.mocks,
        };
        let events = collect(&h, false).await;

        let thinking = events
            .iter()
            .filter(|e| matches!(e, TaskEvent::Thinking { .. }))
            .count();
        assert_eq!(thinking, 4);

        match events.last().unwrap() {
            TaskEvent::Error { message, .. } => assert!(message.contains("maximum")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_escalation() {
        let oracle = MockOracle::new().with_replies(vec![OracleReply::Escalate {
            reason: "needs a human".to_string(),
        }]);
        let h = harness(oracle, vec![]);
        let events = collect(&h, false).await;

        assert!(matches!(events.last().unwrap(), TaskEvent::Escalate { .. }));
        let run = h.store.get_run(run_id_of(&events)).await.unwrap();
        assert_eq!(run.status, RunStatus::Escalated);
    }

    struct SilentOracle;

    #[async_trait]
    impl Oracle for SilentOracle {
        async fn decide(&self, _request: OracleRequest) -> Result<OracleReply, OracleError> {
            futures::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_timeout_fails_run() {
        let h = harness(SilentOracle, vec![]);
        let events = collect(&h, false).await;

        match events.last().unwrap() {
            TaskEvent::Error { message, .. } => {
                assert!(message.contains("did not respond"));
            }
            other => panic!("expected error, got {other:?}"),
        }
        let run = h.store.get_run(run_id_of(&events)).await.unwrap();
        assert_eq!(run.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_cancellation() {
        let oracle = MockOracle::new().with_replies(vec![OracleReply::Message {
            text: "never gets here".to_string(),
        }]);
        let h = harness(oracle, vec![]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let events: Vec<TaskEvent> = h
            .executor
            .run("test goal", Bindings::new(), false, cancel)
            .collect()
            .await;

        match events.last().unwrap() {
            TaskEvent::Error { message, .. } => assert_eq!(message, "cancelled"),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_test_mode_simulates_and_tags() {
        let oracle = MockOracle::new().with_replies(vec![
            invoke("send_message", json!({"to": "a@b.com"})),
            finish(),
        ]);
        let h = harness(oracle, vec![MockConnector::new("send_message")]);
        let events = collect(&h, true).await;

        let result = events
            .iter()
            .find_map(|e| match e {
                TaskEvent::ToolResult {
                    simulated, summary, ..
                } => Some((*simulated, summary.clone())),
                _ => None,
            })
            .unwrap();
        assert!(result.0);
        assert!(result.1.starts_with("[simulated]"));

        let records = h.store.list_agent_steps(run_id_of(&events)).await.unwrap();
        assert!(records[0].simulated);
        assert_eq!(records[0].output["simulated"], json!(true));
    }

    #[tokio::test]
    async fn test_oracle_sees_merged_outputs_and_history() {
        let oracle = Arc::new(MockOracle::new().with_replies(vec![
            invoke("create_payment_link", json!({"amount": 10})),
            finish(),
        ]));

        let mock = Arc::new(MockConnector::new("create_payment_link").with_outcome(
            relay_capability::Outcome::ok(
                json!({"payment_url": "https://pay.example/1"}),
                "link created",
            ),
        ));
        let mut registry = ConnectorRegistry::new();
        registry.register_arc(mock.clone());
        let executor = AgentExecutor::new(
            oracle.clone(),
            Arc::new(Dispatcher::new(registry, DispatcherConfig::default())),
            Arc::new(MemoryStore::new()),
            Arc::new(CredentialStore::new()),
        );

        let events: Vec<TaskEvent> = executor
            .run("invoice", Bindings::new(), false, CancellationToken::new())
            .collect()
            .await;
        assert!(matches!(events.last().unwrap(), TaskEvent::Complete { .. }));

        // the second consultation sees the first step's output merged into
        // the context and summarized in the history
        let requests = oracle.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].context.get("payment_url"),
            Some(&json!("https://pay.example/1"))
        );
        assert_eq!(requests[1].history.len(), 1);
        assert_eq!(requests[1].history[0].summary, "link created");
        assert!(requests[0].capabilities.contains(&"create_payment_link".to_string()));
    }

    #[test]
    fn test_summarize_truncates_and_tags() {
        let long = "x".repeat(900);
        let outcome = Outcome::ok(json!({}), long);
        let summary = summarize(&outcome);
        assert_eq!(summary.chars().count(), MAX_SUMMARY_CHARS + 1);

        let simulated = relay_capability::Outcome::simulated(json!({}), "would send");
        assert!(summarize(&simulated).starts_with("[simulated]"));
    }
}
