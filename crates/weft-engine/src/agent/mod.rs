pub mod discovery;
pub mod memory;
pub mod tools;

use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, info};

use weft_core::context::RunContext;
use weft_core::error::{Result, WeftError};
use weft_core::status::NodeStatus;
use weft_core::types::{validate_variable_name, Role};
use weft_llm::{
    ChatMessage, ChatRequest, ChatResponse, ContentBlock, Provider, Role as LlmRole, ToolSpec,
    DEFAULT_MAX_TOKENS,
};

use crate::executor::{ExecutorContext, NodeExecutor};

use discovery::{discover, AgentWiring};
use memory::MemorySettings;

pub const DEFAULT_MAX_ITERATIONS: u64 = 10;
pub const MAX_ITERATIONS_CEILING: u64 = 25;

/// The AI_AGENT node: compiles its local sub-graph — one chat model, an
/// optional memory, any number of tools — into a bounded tool-calling loop,
/// then writes `{agentResponse, toolCallCount}` and the trimmed
/// conversation history back into the context.
pub struct AgentExecutor;

impl NodeExecutor for AgentExecutor {
    fn execute<'a>(&'a self, ctx: ExecutorContext<'a>) -> BoxFuture<'a, Result<Option<RunContext>>> {
        Box::pin(async move {
            let wiring = discover(ctx.workflow, &ctx.node.id);

            // Visual fan-out: the agent's sub-nodes light up with it.
            ctx.emit(NodeStatus::Loading);
            fan_out(&ctx, &wiring, NodeStatus::Loading);

            match run_agent(&ctx, &wiring).await {
                Ok(new_context) => {
                    ctx.emit(NodeStatus::Success);
                    fan_out(&ctx, &wiring, NodeStatus::Success);
                    Ok(Some(new_context))
                }
                Err(e) => {
                    // The driver emits the agent's own terminal error; the
                    // sub-nodes are only known here.
                    fan_out(&ctx, &wiring, NodeStatus::Error);
                    Err(e)
                }
            }
        })
    }
}

fn fan_out(ctx: &ExecutorContext<'_>, wiring: &AgentWiring<'_>, status: NodeStatus) {
    let sub_nodes = wiring
        .chat_model
        .iter()
        .chain(wiring.memory.iter())
        .chain(wiring.tools.iter());
    for node in sub_nodes {
        ctx.publish.emit(&node.id, node.kind, status);
    }
}

async fn run_agent(ctx: &ExecutorContext<'_>, wiring: &AgentWiring<'_>) -> Result<RunContext> {
    let node = ctx.node;

    let variable = node.require_str("variableName")?.to_string();
    validate_variable_name(&variable)?;
    let prompt = ctx.render(node.require_str("userPrompt")?);
    let system = node.data_str("systemPrompt").map(|s| ctx.render(s));
    let max_iterations = node
        .data_u64("maxIterations")
        .unwrap_or(DEFAULT_MAX_ITERATIONS)
        .clamp(1, MAX_ITERATIONS_CEILING) as usize;

    // Model resolution. The chat-model sub-node must name a provider and
    // carry a credential; its key comes from the vault.
    let model_node = wiring
        .chat_model
        .ok_or_else(|| WeftError::AgentMissingModel(node.id.clone()))?;
    let provider_name = model_node
        .data_str("provider")
        .ok_or_else(|| WeftError::AgentMissingModel(node.id.clone()))?;
    let credential_id = model_node
        .credential_id
        .as_deref()
        .ok_or_else(|| WeftError::AgentMissingModel(node.id.clone()))?;
    let provider = Provider::parse(provider_name);
    let model = model_node
        .data_str("model")
        .unwrap_or(provider.default_model())
        .to_string();

    let store = ctx
        .services
        .store
        .as_ref()
        .ok_or_else(|| WeftError::AgentMissingKey(node.id.clone()))?;
    let api_key = store
        .secret(ctx.org(), credential_id)
        .map_err(|_| WeftError::AgentMissingKey(node.id.clone()))?;
    let client = ctx.services.clients.client(provider, api_key);

    // Memory window in.
    let memory_settings = wiring.memory.map(MemorySettings::from_node);
    let full_history = memory_settings
        .as_ref()
        .map(|m| memory::history_from_context(ctx.context, &m.memory_key))
        .unwrap_or_default();

    // Tool assembly from the connected sub-nodes.
    let toolset = tools::assemble(&wiring.tools, ctx.org(), ctx.services)?;
    let specs: Vec<ToolSpec> = toolset
        .iter()
        .map(|tool| ToolSpec {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.input_schema(),
        })
        .collect();

    debug!(
        node_id = %node.id,
        provider = ?provider,
        model = %model,
        tools = toolset.len(),
        max_iterations,
        "agent assembled"
    );

    let mut messages: Vec<ChatMessage> = Vec::new();
    if let Some(settings) = &memory_settings {
        for turn in memory::window(&full_history, settings.window_size) {
            match turn.role {
                Role::User => messages.push(ChatMessage::user(turn.content.clone())),
                Role::Assistant => messages.push(ChatMessage::assistant_text(turn.content.clone())),
                Role::System => {}
            }
        }
    }
    messages.push(ChatMessage::user(prompt.clone()));

    let mut tool_call_count: u64 = 0;
    let mut final_text = String::new();

    for round in 0..max_iterations {
        let request = ChatRequest {
            model: model.clone(),
            system: system.clone(),
            messages: messages.clone(),
            tools: specs.clone(),
            max_tokens: DEFAULT_MAX_TOKENS,
        };

        // Each LLM round is its own durable step; a retried run re-reads the
        // memoised response instead of re-calling the provider.
        let value = ctx
            .step(&format!("llm:{}", round), {
                let client = client.clone();
                Box::pin(async move {
                    let response = client.complete(request).await?;
                    Ok(serde_json::to_value(response)?)
                })
            })
            .await?;
        let response: ChatResponse = serde_json::from_value(value)?;
        final_text = response.text.clone();

        if response.tool_calls.is_empty() {
            debug!(node_id = %node.id, round, "agent reached terminal response");
            break;
        }

        let mut assistant_blocks: Vec<ContentBlock> = Vec::new();
        if !response.text.is_empty() {
            assistant_blocks.push(ContentBlock::Text {
                text: response.text.clone(),
            });
        }
        let mut result_blocks: Vec<ContentBlock> = Vec::new();

        for (idx, call) in response.tool_calls.iter().enumerate() {
            assistant_blocks.push(ContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.name.clone(),
                input: call.arguments.clone(),
            });

            // Tool side effects share the agent's durable scope.
            let outcome = ctx
                .step(&format!("tool:{}:{}:{}", round, idx, call.name), {
                    let toolset = &toolset;
                    let name = call.name.clone();
                    let arguments = call.arguments.clone();
                    Box::pin(async move {
                        let outcome = toolset.execute(&name, arguments).await?;
                        Ok(json!({ "content": outcome.content, "isError": outcome.is_error }))
                    })
                })
                .await?;
            tool_call_count += 1;

            result_blocks.push(ContentBlock::ToolResult {
                tool_use_id: call.id.clone(),
                name: call.name.clone(),
                content: outcome
                    .get("content")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                is_error: outcome
                    .get("isError")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false),
            });
        }

        messages.push(ChatMessage {
            role: LlmRole::Assistant,
            content: assistant_blocks,
        });
        messages.push(ChatMessage {
            role: LlmRole::User,
            content: result_blocks,
        });
    }

    info!(
        node_id = %node.id,
        tool_calls = tool_call_count,
        "agent run complete"
    );

    let mut new_context = ctx.context.with(
        variable,
        json!({ "agentResponse": final_text, "toolCallCount": tool_call_count }),
    );
    if let Some(settings) = memory_settings {
        let updated =
            memory::append_and_trim(full_history, &prompt, &final_text, settings.window_size);
        new_context.set(settings.memory_key, serde_json::to_value(updated)?);
    }
    Ok(new_context)
}
