use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use weft_core::context::RunContext;
use weft_core::error::Result;
use weft_core::status::NodeStatus;
use weft_core::types::validate_variable_name;
use weft_llm::{ChatMessage, ChatRequest, ChatResponse, Provider, DEFAULT_MAX_TOKENS};

use crate::executor::{ExecutorContext, NodeExecutor};

/// Single-shot LLM node (GEMINI / OPENAI / ANTHROPIC): one prompt, one
/// completion, written as `{aiResponse}` under the variable name.
pub struct LlmExecutor {
    provider: Provider,
}

impl LlmExecutor {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }
}

impl NodeExecutor for LlmExecutor {
    fn execute<'a>(&'a self, ctx: ExecutorContext<'a>) -> BoxFuture<'a, Result<Option<RunContext>>> {
        Box::pin(async move {
            ctx.emit(NodeStatus::Loading);

            let prompt_template = ctx.node.require_str("userPrompt")?;
            let variable = ctx.node.require_str("variableName")?.to_string();
            validate_variable_name(&variable)?;

            let prompt = ctx.render(prompt_template);
            let system = ctx.node.data_str("systemPrompt").map(|s| ctx.render(s));
            let model = ctx
                .node
                .data_str("model")
                .unwrap_or(self.provider.default_model())
                .to_string();

            let api_key = ctx.resolve_api_key(self.provider)?;
            let client = ctx.services.clients.client(self.provider, api_key);

            debug!(node_id = %ctx.node.id, model = %model, "llm node generation");

            let request = ChatRequest {
                model,
                system,
                messages: vec![ChatMessage::user(prompt)],
                tools: vec![],
                max_tokens: DEFAULT_MAX_TOKENS,
            };

            let value = ctx
                .step("generate", {
                    Box::pin(async move {
                        let response = client.complete(request).await?;
                        Ok(serde_json::to_value(response)?)
                    })
                })
                .await?;
            let response: ChatResponse = serde_json::from_value(value)?;

            let new_context = ctx
                .context
                .with(variable, json!({ "aiResponse": response.text }));
            ctx.emit(NodeStatus::Success);
            Ok(Some(new_context))
        })
    }
}
