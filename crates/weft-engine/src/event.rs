use serde::{Deserialize, Serialize};

use weft_core::types::WorkflowId;

/// Message name that invokes a run.
pub const EXECUTE_WORKFLOW_EVENT: &str = "workflows/execute.workflow";

/// Payload of the run-invocation event. `initial_data` seeds the run
/// context; webhook surfaces put their namespaced payloads
/// (`googleForm.*`, `stripe.*`) here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteWorkflow {
    pub workflow_id: WorkflowId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_data: Option<serde_json::Value>,
}
