//! The assembled platform: one object that owns the connector registry, the
//! dispatcher, the store, and both executors, built through a fluent
//! builder.

use std::sync::Arc;

use relay_agent::{AgentConfig, AgentExecutor, Oracle, OracleReply, OracleRequest, TaskStream};
use relay_capability::{
    Connector, ConnectorRegistry, CredentialStore, Dispatcher, DispatcherConfig,
    builtin_registry,
};
use relay_graph::{EngineError, GateError, GraphConfig, GraphExecutor};
use relay_types::{
    ApprovalDecision, ApprovalId, ApprovalRequest, Bindings, MemoryStore, Run, RunId,
    RunStore, StepGraph, StepRun,
};
use tokio_util::sync::CancellationToken;

/// Placeholder oracle used when none is configured. Every agent task is
/// escalated immediately instead of silently doing nothing.
struct UnconfiguredOracle;

#[async_trait::async_trait]
impl Oracle for UnconfiguredOracle {
    async fn decide(
        &self,
        _request: OracleRequest,
    ) -> Result<OracleReply, relay_agent::OracleError> {
        Ok(OracleReply::Escalate {
            reason: "no oracle configured".to_string(),
        })
    }
}

/// Builder for [`Platform`].
pub struct PlatformBuilder {
    registry: ConnectorRegistry,
    store: Option<Arc<dyn RunStore>>,
    credentials: CredentialStore,
    oracle: Option<Arc<dyn Oracle>>,
    dispatcher_config: DispatcherConfig,
    graph_config: GraphConfig,
    agent_config: AgentConfig,
}

impl Default for PlatformBuilder {
    fn default() -> Self {
        Self {
            registry: builtin_registry(),
            store: None,
            credentials: CredentialStore::new(),
            oracle: None,
            dispatcher_config: DispatcherConfig::default(),
            graph_config: GraphConfig::default(),
            agent_config: AgentConfig::default(),
        }
    }
}

impl PlatformBuilder {
    /// Register an additional connector (or override a built-in one).
    pub fn with_connector<C: Connector + 'static>(mut self, connector: C) -> Self {
        self.registry.register(connector);
        self
    }

    /// Replace the whole registry, dropping the built-ins.
    pub fn with_registry(mut self, registry: ConnectorRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use a specific store instead of the in-memory default.
    pub fn with_store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Provide the credential bundles connectors draw from.
    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set the oracle driving agent tasks.
    pub fn with_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Tune the dispatcher.
    pub fn with_dispatcher_config(mut self, config: DispatcherConfig) -> Self {
        self.dispatcher_config = config;
        self
    }

    /// Tune the graph executor.
    pub fn with_graph_config(mut self, config: GraphConfig) -> Self {
        self.graph_config = config;
        self
    }

    /// Tune the agent executor's safety bounds.
    pub fn with_agent_config(mut self, config: AgentConfig) -> Self {
        self.agent_config = config;
        self
    }

    /// Assemble the platform.
    pub fn build(self) -> Platform {
        let store: Arc<dyn RunStore> =
            self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let credentials = Arc::new(self.credentials);
        let dispatcher = Arc::new(Dispatcher::new(self.registry, self.dispatcher_config));
        let oracle = self
            .oracle
            .unwrap_or_else(|| Arc::new(UnconfiguredOracle));

        let graphs = GraphExecutor::new(
            dispatcher.clone(),
            store.clone(),
            credentials.clone(),
        )
        .with_config(self.graph_config);

        let agent = AgentExecutor::new(
            oracle,
            dispatcher.clone(),
            store.clone(),
            credentials.clone(),
        )
        .with_config(self.agent_config);

        Platform {
            dispatcher,
            store,
            graphs,
            agent,
        }
    }
}

/// The automation engine, fully wired.
pub struct Platform {
    dispatcher: Arc<Dispatcher>,
    store: Arc<dyn RunStore>,
    graphs: GraphExecutor,
    agent: AgentExecutor,
}

impl Platform {
    /// Start building a platform.
    pub fn builder() -> PlatformBuilder {
        PlatformBuilder::default()
    }

    /// Execute a step graph against trigger data.
    pub async fn run_step_graph(
        &self,
        graph: &StepGraph,
        trigger: Bindings,
        test_mode: bool,
    ) -> Result<Run, EngineError> {
        self.graphs.run(graph, trigger, test_mode).await
    }

    /// Resolve an approval request and, if approved, resume its branch.
    pub async fn resume_approval(
        &self,
        graph: &StepGraph,
        request_id: ApprovalId,
        decision: ApprovalDecision,
        rejection_reason: Option<String>,
    ) -> Result<Run, EngineError> {
        self.graphs
            .resume_approval(graph, request_id, decision, rejection_reason)
            .await
    }

    /// Approval requests for a run that still await a decision.
    pub async fn pending_approvals(
        &self,
        run_id: RunId,
    ) -> Result<Vec<ApprovalRequest>, GateError> {
        self.graphs.gate().pending_for_run(run_id).await
    }

    /// Start an agent task and stream its events.
    pub fn run_agent_task(
        &self,
        goal: impl Into<String>,
        context: Bindings,
        test_mode: bool,
    ) -> TaskStream {
        self.agent
            .run(goal, context, test_mode, CancellationToken::new())
    }

    /// Start an agent task with an external cancellation handle.
    pub fn run_agent_task_with_cancel(
        &self,
        goal: impl Into<String>,
        context: Bindings,
        test_mode: bool,
        cancel: CancellationToken,
    ) -> TaskStream {
        self.agent.run(goal, context, test_mode, cancel)
    }

    /// Look a run up.
    pub async fn run(&self, id: RunId) -> Result<Run, relay_types::StoreError> {
        self.store.get_run(id).await
    }

    /// Step runs for a run, in creation order.
    pub async fn step_runs(
        &self,
        run_id: RunId,
    ) -> Result<Vec<StepRun>, relay_types::StoreError> {
        self.store.list_step_runs(run_id).await
    }

    /// The dispatcher, for previews and registry introspection.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn RunStore> {
        &self.store
    }
}
