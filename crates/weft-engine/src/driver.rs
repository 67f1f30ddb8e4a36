use std::sync::Arc;

use tracing::{debug, info, warn};

use weft_core::context::RunContext;
use weft_core::error::{Result, WeftError};
use weft_core::status::{NodeStatus, RunPublisher, StatusPublisher};
use weft_core::step::StepRuntime;
use weft_core::types::{RunId, Workflow};

use crate::executor::{ExecutorContext, Services};
use crate::planner;
use crate::registry::ExecutorRegistry;

/// Drives one workflow run: plans, then executes the plan strictly
/// sequentially, threading the value context from node to node.
///
/// Each node runs inside the durable step `node:{id}`, whose memoised value
/// is the node's returned context — re-entering a run after a transient
/// failure skips completed nodes and reproduces the same context. Executors
/// publish `loading`/`success` themselves; the driver publishes `error` for
/// the failing node and re-throws the failure verbatim so the step runtime
/// sees it.
pub struct RunDriver {
    registry: Arc<ExecutorRegistry>,
    services: Services,
    publisher: StatusPublisher,
}

impl RunDriver {
    pub fn new(registry: Arc<ExecutorRegistry>, services: Services, publisher: StatusPublisher) -> Self {
        Self {
            registry,
            services,
            publisher,
        }
    }

    /// Execute with a fresh run identity.
    pub async fn execute(
        &self,
        workflow: &Workflow,
        initial: RunContext,
        steps: Arc<dyn StepRuntime>,
    ) -> Result<RunContext> {
        self.execute_run(workflow, initial, steps, RunId::new()).await
    }

    /// Execute under a caller-chosen run identity. Re-entering with the same
    /// step runtime replays memoised nodes.
    pub async fn execute_run(
        &self,
        workflow: &Workflow,
        initial: RunContext,
        steps: Arc<dyn StepRuntime>,
        run_id: RunId,
    ) -> Result<RunContext> {
        // Plan errors abort before any status event.
        let plan = planner::plan(workflow)?;
        info!(
            workflow_id = %workflow.id,
            run_id = %run_id,
            plan_len = plan.len(),
            "starting workflow run"
        );

        let publisher = RunPublisher::new(self.publisher.clone(), run_id.clone());
        let mut context = initial;

        for node in plan {
            let executor = match self.registry.get(node.kind) {
                Some(executor) => executor,
                None => {
                    // A configuration error: the offending node is marked
                    // before the run aborts.
                    publisher.emit(&node.id, node.kind, NodeStatus::Error);
                    return Err(WeftError::UnknownNodeKind(node.kind.as_str().to_string()));
                }
            };

            debug!(node_id = %node.id, kind = %node.kind, "executing node");
            let step_name = format!("node:{}", node.id);
            let snapshot = context.clone();

            let result = {
                let steps_for_node = Arc::clone(&steps);
                let services = &self.services;
                let publisher_ref = &publisher;
                let run_id_ref = &run_id;
                steps
                    .run(
                        &step_name,
                        Box::pin(async move {
                            let ectx = ExecutorContext {
                                node,
                                workflow,
                                run_id: run_id_ref,
                                context: &snapshot,
                                steps: &*steps_for_node,
                                publish: publisher_ref,
                                services,
                            };
                            let returned = executor.execute(ectx).await?;
                            // No return value keeps the prior context.
                            let new_context = returned.unwrap_or_else(|| snapshot.clone());
                            Ok(new_context.to_value())
                        }),
                    )
                    .await
            };

            match result {
                Ok(value) => {
                    let new_context = RunContext::from_value(value)?;
                    if !new_context.is_superset_of(&context) {
                        warn!(
                            node_id = %node.id,
                            "executor returned a non-superset context"
                        );
                    }
                    context = new_context;
                }
                Err(e) => {
                    publisher.emit(&node.id, node.kind, NodeStatus::Error);
                    return Err(e);
                }
            }
        }

        info!(workflow_id = %workflow.id, run_id = %run_id, "workflow run complete");
        Ok(context)
    }
}
