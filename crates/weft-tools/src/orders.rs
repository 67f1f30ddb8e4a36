use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, warn};

use weft_core::error::Result;
use weft_core::types::OrgId;
use weft_store::WorkflowStore;

use crate::{parse_input, Tool, ToolOutcome};

const DEFAULT_LIMIT: usize = 20;
const ORDER_STATUSES: &[&str] = &["pending", "processing", "shipped", "delivered", "cancelled"];

/// Read-only order search, scoped to the agent's owning organization.
pub struct SearchOrdersTool {
    org: OrgId,
    store: Arc<WorkflowStore>,
}

impl SearchOrdersTool {
    pub fn new(org: OrgId, store: Arc<WorkflowStore>) -> Self {
        Self { org, store }
    }
}

#[derive(Deserialize)]
struct SearchOrdersInput {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

impl Tool for SearchOrdersTool {
    fn name(&self) -> &str {
        "search_orders"
    }

    fn description(&self) -> &str {
        "Search orders by customer name or order id, optionally filtered by status."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "description": "Customer name or order id fragment" },
                "status": { "type": "string", "enum": ORDER_STATUSES },
                "limit": { "type": "integer", "description": "Maximum results (default: 20)" }
            }
        })
    }

    fn execute<'a>(&'a self, input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>> {
        Box::pin(async move {
            let params: SearchOrdersInput = parse_input(self.name(), input)?;
            let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(100);

            debug!(org = %self.org, query = ?params.query, status = ?params.status, "search_orders tool call");
            match self.store.search_orders(
                &self.org,
                params.query.as_deref(),
                params.status.as_deref(),
                limit,
            ) {
                Ok(orders) => {
                    let payload = serde_json::to_string_pretty(&orders)?;
                    Ok(ToolOutcome::success(payload))
                }
                Err(e) => Ok(ToolOutcome::error(format!("Error: {}", e))),
            }
        })
    }
}

/// The one write tool in the catalogue. The update is tenant-guarded: an
/// order belonging to another organization reads as not found, and nothing
/// is written.
pub struct UpdateOrderStatusTool {
    org: OrgId,
    store: Arc<WorkflowStore>,
}

impl UpdateOrderStatusTool {
    pub fn new(org: OrgId, store: Arc<WorkflowStore>) -> Self {
        Self { org, store }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateOrderStatusInput {
    order_id: String,
    new_status: String,
}

impl Tool for UpdateOrderStatusTool {
    fn name(&self) -> &str {
        "update_order_status"
    }

    fn description(&self) -> &str {
        "Update the status of an order. Valid statuses: pending, processing, shipped, delivered, cancelled."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "orderId": { "type": "string", "description": "The order to update" },
                "newStatus": { "type": "string", "enum": ORDER_STATUSES }
            },
            "required": ["orderId", "newStatus"]
        })
    }

    fn execute<'a>(&'a self, input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>> {
        Box::pin(async move {
            let params: UpdateOrderStatusInput = parse_input(self.name(), input)?;

            if !ORDER_STATUSES.contains(&params.new_status.as_str()) {
                return Ok(ToolOutcome::error(format!(
                    "Error: '{}' is not a valid order status",
                    params.new_status
                )));
            }

            match self
                .store
                .update_order_status(&self.org, &params.order_id, &params.new_status)
            {
                Ok(Some(order)) => {
                    debug!(org = %self.org, order_id = %order.id, status = %order.status, "order status updated");
                    Ok(ToolOutcome::success(format!(
                        "Order #{} updated to '{}'",
                        order.id, order.status
                    )))
                }
                Ok(None) => {
                    // Missing and foreign-tenant orders are deliberately
                    // indistinguishable here.
                    warn!(org = %self.org, order_id = %params.order_id, "order update refused");
                    Ok(ToolOutcome::error(format!(
                        "Error: Order #{} not found",
                        params.order_id
                    )))
                }
                Err(e) => Ok(ToolOutcome::error(format!("Error: {}", e))),
            }
        })
    }
}

/// Aggregate order counts and revenue for the organization.
pub struct OrderStatsTool {
    org: OrgId,
    store: Arc<WorkflowStore>,
}

impl OrderStatsTool {
    pub fn new(org: OrgId, store: Arc<WorkflowStore>) -> Self {
        Self { org, store }
    }
}

impl Tool for OrderStatsTool {
    fn name(&self) -> &str {
        "get_order_stats"
    }

    fn description(&self) -> &str {
        "Get order totals: count, revenue, and a breakdown by status."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object", "properties": {} })
    }

    fn execute<'a>(&'a self, _input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>> {
        Box::pin(async move {
            match self.store.order_stats(&self.org) {
                Ok(stats) => {
                    let payload = serde_json::to_string_pretty(&stats)?;
                    Ok(ToolOutcome::success(payload))
                }
                Err(e) => Ok(ToolOutcome::error(format!("Error: {}", e))),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_store::Vault;

    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

    fn seeded_store() -> (Arc<WorkflowStore>, OrgId, OrgId) {
        let store = Arc::new(WorkflowStore::in_memory(Vault::new(TEST_KEY).unwrap()).unwrap());
        let org_a = OrgId::new("org-a");
        let org_b = OrgId::new("org-b");
        store.insert_organization(&org_a, "A").unwrap();
        store.insert_organization(&org_b, "B").unwrap();
        store.insert_order(&org_a, "7", "Ada", "pending", 1000).unwrap();
        store.insert_order(&org_b, "42", "Maya", "pending", 5000).unwrap();
        (store, org_a, org_b)
    }

    #[tokio::test]
    async fn test_search_orders_scoped() {
        let (store, org_a, _) = seeded_store();
        let tool = SearchOrdersTool::new(org_a, store);
        let outcome = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(outcome.content.contains("Ada"));
        assert!(!outcome.content.contains("Maya"));
    }

    #[tokio::test]
    async fn test_cross_tenant_update_is_refused() {
        let (store, org_a, org_b) = seeded_store();

        // Order 42 belongs to org-b; org-a's agent must not touch it.
        let tool = UpdateOrderStatusTool::new(org_a, store.clone());
        let outcome = tool
            .execute(serde_json::json!({"orderId": "42", "newStatus": "shipped"}))
            .await
            .unwrap();
        assert!(outcome.is_error);
        assert!(outcome.content.starts_with("Error: Order #42 not found"));

        let untouched = store.search_orders(&org_b, None, None, 10).unwrap();
        assert_eq!(untouched[0].status, "pending");
    }

    #[tokio::test]
    async fn test_same_tenant_update_succeeds() {
        let (store, org_a, _) = seeded_store();
        let tool = UpdateOrderStatusTool::new(org_a.clone(), store.clone());
        let outcome = tool
            .execute(serde_json::json!({"orderId": "7", "newStatus": "shipped"}))
            .await
            .unwrap();
        assert!(!outcome.is_error);
        let orders = store.search_orders(&org_a, None, None, 10).unwrap();
        assert_eq!(orders[0].status, "shipped");
    }

    #[tokio::test]
    async fn test_invalid_status_rejected() {
        let (store, org_a, _) = seeded_store();
        let tool = UpdateOrderStatusTool::new(org_a, store);
        let outcome = tool
            .execute(serde_json::json!({"orderId": "7", "newStatus": "vanished"}))
            .await
            .unwrap();
        assert!(outcome.is_error);
        assert!(outcome.content.contains("not a valid order status"));
    }

    #[tokio::test]
    async fn test_order_stats() {
        let (store, org_a, _) = seeded_store();
        let tool = OrderStatsTool::new(org_a, store);
        let outcome = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(outcome.content.contains("\"totalOrders\": 1"));
        assert!(outcome.content.contains("\"revenueCents\": 1000"));
    }
}
