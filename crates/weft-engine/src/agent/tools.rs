use std::sync::Arc;

use tracing::debug;

use weft_core::error::{Result, WeftError};
use weft_core::types::{Node, NodeKind, OrgId};
use weft_tools::{
    CalculatorTool, HttpRequestTool, ListWarehousesTool, OrderStatsTool, PassthroughTool,
    SearchOrdersTool, SearchProductsTool, SendEmailTool, SmtpConfig, ToolSet,
    UpdateOrderStatusTool, WebScraperTool,
};

use crate::executor::Services;

/// Build the tool set for one agent invocation from its connected tool
/// sub-nodes. Unknown kinds become pass-through echo tools.
pub fn assemble(tool_nodes: &[&Node], org: &OrgId, services: &Services) -> Result<ToolSet> {
    let mut set = ToolSet::new();

    for node in tool_nodes {
        match node.kind {
            NodeKind::HttpRequest => set.add(Arc::new(HttpRequestTool)),
            NodeKind::SendEmail => {
                let config = SmtpConfig::from_node_data(&node.data)?;
                set.add(Arc::new(SendEmailTool::new(config)));
            }
            NodeKind::WebScraper => {
                let max_length = node
                    .data_u64("maxLength")
                    .map(|n| n as usize)
                    .unwrap_or(weft_tools::scraper::DEFAULT_MAX_LENGTH);
                set.add(Arc::new(WebScraperTool::new(max_length)));
            }
            NodeKind::Calculator => set.add(Arc::new(CalculatorTool)),
            NodeKind::InventoryLookup => {
                let store = domain_store(services, node)?;
                set.add(Arc::new(SearchProductsTool::new(org.clone(), store.clone())));
                set.add(Arc::new(ListWarehousesTool::new(org.clone(), store)));
            }
            NodeKind::OrderManager => {
                let store = domain_store(services, node)?;
                set.add(Arc::new(SearchOrdersTool::new(org.clone(), store.clone())));
                set.add(Arc::new(UpdateOrderStatusTool::new(org.clone(), store.clone())));
                set.add(Arc::new(OrderStatsTool::new(org.clone(), store)));
            }
            other => {
                debug!(node_id = %node.id, kind = %other, "no dedicated adapter, using pass-through tool");
                let name = node
                    .data_str("name")
                    .map(str::to_string)
                    .unwrap_or_else(|| other.as_str().to_lowercase());
                set.add(Arc::new(PassthroughTool::new(name)));
            }
        }
    }

    Ok(set)
}

fn domain_store(
    services: &Services,
    node: &Node,
) -> Result<Arc<weft_store::WorkflowStore>> {
    services.store.clone().ok_or_else(|| WeftError::InvalidConfig {
        kind: node.kind.as_str().into(),
        message: "this tool requires a relational store".into(),
    })
}
