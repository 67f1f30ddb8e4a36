use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use weft_core::error::{Result, WeftError};

use crate::{ChatClient, ChatMessage, ChatRequest, ChatResponse, ContentBlock, Role, StopReason, ToolCall};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API client (non-streaming).
pub struct AnthropicClient {
    http: Client,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
        }
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Serialize, Debug)]
struct ApiMessage {
    role: String,
    content: Vec<ApiBlock>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
enum ApiBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        is_error: bool,
    },
}

#[derive(Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ApiBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

// ── Conversion ───────────────────────────────────────────────────

fn convert_messages(messages: Vec<ChatMessage>) -> Vec<ApiMessage> {
    messages
        .into_iter()
        .filter_map(|msg| {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let content: Vec<ApiBlock> = msg
                .content
                .into_iter()
                .map(|block| match block {
                    ContentBlock::Text { text } => ApiBlock::Text { text },
                    ContentBlock::ToolUse { id, name, input } => {
                        ApiBlock::ToolUse { id, name, input }
                    }
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                        ..
                    } => ApiBlock::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    },
                })
                .collect();
            if content.is_empty() {
                None
            } else {
                Some(ApiMessage {
                    role: role.to_string(),
                    content,
                })
            }
        })
        .collect()
}

impl ChatClient for AnthropicClient {
    fn complete<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, Result<ChatResponse>> {
        Box::pin(async move {
            let body = AnthropicRequest {
                model: request.model.clone(),
                max_tokens: request.max_tokens,
                messages: convert_messages(request.messages),
                system: request.system,
                tools: request
                    .tools
                    .iter()
                    .map(|t| ApiTool {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        input_schema: t.input_schema.clone(),
                    })
                    .collect(),
            };

            debug!(model = %request.model, "anthropic messages request");
            let response = self
                .http
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .json(&body)
                .send()
                .await
                .map_err(|e| WeftError::Llm(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(WeftError::Llm(format!(
                    "anthropic returned {}: {}",
                    status.as_u16(),
                    detail.chars().take(500).collect::<String>()
                )));
            }

            let parsed: AnthropicResponse = response
                .json()
                .await
                .map_err(|e| WeftError::Llm(format!("anthropic response parse error: {}", e)))?;

            let mut text = String::new();
            let mut tool_calls = Vec::new();
            for block in parsed.content {
                match block {
                    ApiBlock::Text { text: t } => text.push_str(&t),
                    ApiBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments: input,
                    }),
                    ApiBlock::ToolResult { .. } => {}
                }
            }

            let stop = match parsed.stop_reason.as_deref() {
                Some("tool_use") => StopReason::ToolUse,
                Some("max_tokens") => StopReason::MaxTokens,
                _ => {
                    if tool_calls.is_empty() {
                        StopReason::EndTurn
                    } else {
                        StopReason::ToolUse
                    }
                }
            };

            Ok(ChatResponse {
                text,
                tool_calls,
                stop,
            })
        })
    }
}
