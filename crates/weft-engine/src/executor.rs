use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use weft_core::context::RunContext;
use weft_core::error::{Result, WeftError};
use weft_core::status::{NodeStatus, RunPublisher};
use weft_core::step::{StepFuture, StepRuntime};
use weft_core::types::{Node, OrgId, RunId, Workflow};
use weft_llm::{ChatClient, Provider};
use weft_store::WorkflowStore;

use crate::template;

/// Shared service handles the executors draw on. Cloned per run.
#[derive(Clone)]
pub struct Services {
    /// Relational store; absent in store-less setups (file-driven runs).
    pub store: Option<Arc<WorkflowStore>>,
    /// Shared HTTP client for executor-level requests.
    pub http: reqwest::Client,
    /// Chat client factory; tests substitute a stub.
    pub clients: Arc<dyn ClientFactory>,
}

impl Services {
    pub fn new() -> Self {
        Self {
            store: None,
            http: reqwest::Client::new(),
            clients: Arc::new(LiveClientFactory),
        }
    }

    pub fn with_store(mut self, store: Arc<WorkflowStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_clients(mut self, clients: Arc<dyn ClientFactory>) -> Self {
        self.clients = clients;
        self
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new()
    }
}

/// Indirection over [`weft_llm::create_client`] so tests can inject a stub
/// model without network access.
pub trait ClientFactory: Send + Sync {
    fn client(&self, provider: Provider, api_key: String) -> Arc<dyn ChatClient>;
}

/// Production factory: real provider clients.
pub struct LiveClientFactory;

impl ClientFactory for LiveClientFactory {
    fn client(&self, provider: Provider, api_key: String) -> Arc<dyn ChatClient> {
        weft_llm::create_client(provider, api_key)
    }
}

/// Everything an executor sees for one node execution.
pub struct ExecutorContext<'a> {
    pub node: &'a Node,
    pub workflow: &'a Workflow,
    pub run_id: &'a RunId,
    /// Snapshot of the run context; executors return a superset, never
    /// mutate.
    pub context: &'a RunContext,
    /// Durable step handle for nested steps.
    pub steps: &'a dyn StepRuntime,
    /// Status publisher bound to this run.
    pub publish: &'a RunPublisher,
    pub services: &'a Services,
}

impl<'a> ExecutorContext<'a> {
    /// Emit a lifecycle status for this node.
    pub fn emit(&self, status: NodeStatus) {
        self.publish.emit(&self.node.id, self.node.kind, status);
    }

    /// Resolve a templated string against the current context.
    pub fn render(&self, template_str: &str) -> String {
        template::render(template_str, self.context)
    }

    /// Run a nested durable step scoped to this node.
    pub async fn step(&self, suffix: &str, fut: StepFuture<'_>) -> Result<Value> {
        let name = format!("node:{}:{}", self.node.id, suffix);
        self.steps.run(&name, fut).await
    }

    pub fn org(&self) -> &OrgId {
        &self.workflow.org_id
    }

    /// Resolve an API key: the node's credential when present, otherwise the
    /// provider-named environment variable.
    pub fn resolve_api_key(&self, provider: Provider) -> Result<String> {
        if let Some(credential_id) = &self.node.credential_id {
            let store = self.services.store.as_ref().ok_or_else(|| {
                WeftError::Credential("credential configured but no store available".into())
            })?;
            return store.secret(self.org(), credential_id);
        }
        std::env::var(provider.env_key_var()).map_err(|_| {
            WeftError::Credential(format!(
                "no credential configured and {} is not set",
                provider.env_key_var()
            ))
        })
    }
}

/// A node executor. Implementations emit `loading` at entry and `success`
/// at exit; the driver emits `error` when an executor fails. The returned
/// context must be a superset of the input; `None` keeps the input
/// unchanged.
pub trait NodeExecutor: Send + Sync {
    fn execute<'a>(&'a self, ctx: ExecutorContext<'a>) -> BoxFuture<'a, Result<Option<RunContext>>>;
}
