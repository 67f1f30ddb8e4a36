pub mod calculator;
pub mod email;
pub mod http;
pub mod inventory;
pub mod orders;
pub mod passthrough;
pub mod scraper;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;

use weft_core::error::{Result, WeftError};

pub use calculator::CalculatorTool;
pub use email::{SendEmailTool, SmtpConfig};
pub use http::HttpRequestTool;
pub use inventory::{ListWarehousesTool, SearchProductsTool};
pub use orders::{OrderStatsTool, SearchOrdersTool, UpdateOrderStatusTool};
pub use passthrough::PassthroughTool;
pub use scraper::WebScraperTool;

/// Result of a tool execution. Failures are data, not control flow: they are
/// fed back to the model as an error result rather than aborting the agent.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub content: String,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: true,
        }
    }
}

/// Tool — a named capability the agent can expose to the model.
///
/// Unlike a global registry, tools are constructed per agent invocation from
/// the agent's connected sub-nodes, so each instance captures its own
/// configuration (SMTP settings, owning organization, store handle).
pub trait Tool: Send + Sync {
    /// Tool name, as the model calls it.
    fn name(&self) -> &str;

    /// Human-readable description sent to the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool input.
    fn input_schema(&self) -> serde_json::Value;

    /// Execute with the model-provided input.
    fn execute<'a>(&'a self, input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>>;
}

/// The set of tools assembled for one agent invocation.
#[derive(Default)]
pub struct ToolSet {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet").field("order", &self.order).finish()
    }
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Tools in registration order, for stable definition lists.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Tool>> {
        self.order.iter().filter_map(|name| self.tools.get(name))
    }

    /// Execute a tool by name. An unknown name is an error outcome, not a
    /// run failure — the model gets to read it and recover.
    pub async fn execute(&self, name: &str, input: serde_json::Value) -> Result<ToolOutcome> {
        match self.get(name) {
            Some(tool) => tool.execute(input).await,
            None => Ok(ToolOutcome::error(format!("Error: unknown tool '{}'", name))),
        }
    }
}

/// Parse tool input into a typed struct, mapping failures to a
/// configuration-style error naming the tool.
pub(crate) fn parse_input<T: serde::de::DeserializeOwned>(
    tool: &str,
    input: serde_json::Value,
) -> Result<T> {
    serde_json::from_value(input).map_err(|e| WeftError::InvalidConfig {
        kind: tool.to_string(),
        message: format!("invalid tool input: {}", e),
    })
}

/// Truncate a tool payload, marking the cut.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{}\n\n[truncated at {} chars]", cut, max_chars)
}
