use std::sync::Arc;

use weft_core::context::RunContext;
use weft_core::error::Result;
use weft_core::status::{StatusHub, STATUS_TOPIC};
use weft_core::step::{MemorySteps, StepRuntime};
use weft_core::types::{OrgId, Workflow};

use crate::driver::RunDriver;
use crate::event::ExecuteWorkflow;
use crate::executor::Services;
use crate::registry::ExecutorRegistry;

/// Facade wiring the registry, services, and status hub together. Each run
/// gets its own step scope and context; runs are independent and may be
/// driven concurrently.
pub struct Engine {
    registry: Arc<ExecutorRegistry>,
    services: Services,
    hub: Arc<StatusHub>,
}

impl Engine {
    pub fn new(services: Services, hub: Arc<StatusHub>) -> Self {
        Self {
            registry: Arc::new(ExecutorRegistry::with_builtins()),
            services,
            hub,
        }
    }

    pub fn with_registry(mut self, registry: ExecutorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn hub(&self) -> &Arc<StatusHub> {
        &self.hub
    }

    pub fn driver(&self) -> RunDriver {
        RunDriver::new(
            self.registry.clone(),
            self.services.clone(),
            self.hub.publisher(STATUS_TOPIC),
        )
    }

    /// Execute a workflow value directly, with a fresh in-memory step scope.
    pub async fn execute_workflow(
        &self,
        workflow: &Workflow,
        initial_data: Option<serde_json::Value>,
    ) -> Result<RunContext> {
        let initial = match initial_data {
            Some(value) => RunContext::from_value(value)?,
            None => RunContext::new(),
        };
        let steps: Arc<dyn StepRuntime> = Arc::new(MemorySteps::new());
        self.driver().execute(workflow, initial, steps).await
    }

    /// Handle a `workflows/execute.workflow` event: load the stored graph
    /// for the organization and run it.
    pub async fn execute_event(&self, org: &OrgId, event: ExecuteWorkflow) -> Result<RunContext> {
        let store = self.services.store.as_ref().ok_or_else(|| {
            weft_core::error::WeftError::Database("engine has no store configured".into())
        })?;
        let workflow = store.load_workflow(org, &event.workflow_id)?;
        self.execute_workflow(&workflow, event.initial_data).await
    }
}
