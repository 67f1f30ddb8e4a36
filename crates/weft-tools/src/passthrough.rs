use futures::future::BoxFuture;

use weft_core::error::Result;

use crate::{Tool, ToolOutcome};

/// Generic pass-through tool for sub-node kinds with no dedicated adapter.
/// Echoes its input; mostly useful in tests and while wiring up graphs.
pub struct PassthroughTool {
    name: String,
}

impl PassthroughTool {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Tool for PassthroughTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Echoes its input back unchanged."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "input": { "type": "string", "description": "Any value to echo" }
            }
        })
    }

    fn execute<'a>(&'a self, input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>> {
        Box::pin(async move { Ok(ToolOutcome::success(input.to_string())) })
    }
}
