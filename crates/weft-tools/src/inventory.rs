use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use weft_core::error::Result;
use weft_core::types::OrgId;
use weft_store::WorkflowStore;

use crate::{parse_input, Tool, ToolOutcome};

const DEFAULT_LIMIT: usize = 20;

/// Read-only product search, scoped to the agent's owning organization.
pub struct SearchProductsTool {
    org: OrgId,
    store: Arc<WorkflowStore>,
}

impl SearchProductsTool {
    pub fn new(org: OrgId, store: Arc<WorkflowStore>) -> Self {
        Self { org, store }
    }
}

#[derive(Deserialize)]
struct SearchProductsInput {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

impl Tool for SearchProductsTool {
    fn name(&self) -> &str {
        "search_products"
    }

    fn description(&self) -> &str {
        "Search the product catalogue by name or SKU. Returns products with price and total stock."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Name or SKU fragment to match" },
                "limit": { "type": "integer", "description": "Maximum results (default: 20)" }
            }
        })
    }

    fn execute<'a>(&'a self, input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>> {
        Box::pin(async move {
            let params: SearchProductsInput = parse_input(self.name(), input)?;
            let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(100);

            debug!(org = %self.org, query = ?params.query, "search_products tool call");
            match self
                .store
                .search_products(&self.org, params.query.as_deref(), limit)
            {
                Ok(products) => {
                    let payload = serde_json::to_string_pretty(&products)?;
                    Ok(ToolOutcome::success(payload))
                }
                Err(e) => Ok(ToolOutcome::error(format!("Error: {}", e))),
            }
        })
    }
}

/// Read-only warehouse listing, scoped to the agent's owning organization.
pub struct ListWarehousesTool {
    org: OrgId,
    store: Arc<WorkflowStore>,
}

impl ListWarehousesTool {
    pub fn new(org: OrgId, store: Arc<WorkflowStore>) -> Self {
        Self { org, store }
    }
}

impl Tool for ListWarehousesTool {
    fn name(&self) -> &str {
        "list_warehouses"
    }

    fn description(&self) -> &str {
        "List all warehouses for the organization."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn execute<'a>(&'a self, _input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>> {
        Box::pin(async move {
            match self.store.list_warehouses(&self.org) {
                Ok(warehouses) => {
                    let payload = serde_json::to_string_pretty(&warehouses)?;
                    Ok(ToolOutcome::success(payload))
                }
                Err(e) => Ok(ToolOutcome::error(format!("Error: {}", e))),
            }
        })
    }
}
