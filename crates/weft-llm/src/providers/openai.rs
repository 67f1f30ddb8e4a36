use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use weft_core::error::{Result, WeftError};

use crate::{ChatClient, ChatMessage, ChatRequest, ChatResponse, ContentBlock, Role, StopReason, ToolCall};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI chat-completions client (non-streaming).
pub struct OpenAiClient {
    http: Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
        }
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
struct OaiRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiTool>,
}

#[derive(Serialize, Debug)]
struct OaiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OaiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OaiToolCall {
    id: String,
    r#type: String,
    function: OaiFunction,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct OaiFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct OaiTool {
    r#type: String,
    function: OaiToolDef,
}

#[derive(Serialize)]
struct OaiToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct OaiResponse {
    choices: Vec<OaiChoice>,
}

#[derive(Deserialize, Debug)]
struct OaiChoice {
    message: OaiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct OaiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OaiToolCall>>,
}

// ── Conversion ───────────────────────────────────────────────────

fn convert_messages(system: Option<String>, messages: Vec<ChatMessage>) -> Vec<OaiMessage> {
    let mut out = Vec::new();
    if let Some(system) = system {
        out.push(OaiMessage {
            role: "system".into(),
            content: Some(system),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    for msg in messages {
        match msg.role {
            Role::User => {
                // Tool results become their own `tool` messages.
                let mut text = String::new();
                for block in msg.content {
                    match block {
                        ContentBlock::Text { text: t } => text.push_str(&t),
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                            ..
                        } => out.push(OaiMessage {
                            role: "tool".into(),
                            content: Some(content),
                            tool_calls: None,
                            tool_call_id: Some(tool_use_id),
                        }),
                        ContentBlock::ToolUse { .. } => {}
                    }
                }
                if !text.is_empty() {
                    out.push(OaiMessage {
                        role: "user".into(),
                        content: Some(text),
                        tool_calls: None,
                        tool_call_id: None,
                    });
                }
            }
            Role::Assistant => {
                let mut text = String::new();
                let mut calls = Vec::new();
                for block in msg.content {
                    match block {
                        ContentBlock::Text { text: t } => text.push_str(&t),
                        ContentBlock::ToolUse { id, name, input } => calls.push(OaiToolCall {
                            id,
                            r#type: "function".into(),
                            function: OaiFunction {
                                name,
                                arguments: input.to_string(),
                            },
                        }),
                        ContentBlock::ToolResult { .. } => {}
                    }
                }
                out.push(OaiMessage {
                    role: "assistant".into(),
                    content: if text.is_empty() { None } else { Some(text) },
                    tool_calls: if calls.is_empty() { None } else { Some(calls) },
                    tool_call_id: None,
                });
            }
        }
    }
    out
}

impl ChatClient for OpenAiClient {
    fn complete<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, Result<ChatResponse>> {
        Box::pin(async move {
            let body = OaiRequest {
                model: request.model.clone(),
                messages: convert_messages(request.system, request.messages),
                max_tokens: request.max_tokens,
                tools: request
                    .tools
                    .iter()
                    .map(|t| OaiTool {
                        r#type: "function".into(),
                        function: OaiToolDef {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect(),
            };

            debug!(model = %request.model, "openai chat completion");
            let response = self
                .http
                .post(OPENAI_API_URL)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| WeftError::Llm(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(WeftError::Llm(format!(
                    "openai returned {}: {}",
                    status.as_u16(),
                    detail.chars().take(500).collect::<String>()
                )));
            }

            let parsed: OaiResponse = response
                .json()
                .await
                .map_err(|e| WeftError::Llm(format!("openai response parse error: {}", e)))?;

            let choice = parsed
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| WeftError::Llm("openai returned no choices".into()))?;

            let tool_calls = choice
                .message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: serde_json::from_str(&call.function.arguments)
                        .unwrap_or(serde_json::Value::Null),
                })
                .collect::<Vec<_>>();

            let stop = if !tool_calls.is_empty() {
                StopReason::ToolUse
            } else if choice.finish_reason.as_deref() == Some("length") {
                StopReason::MaxTokens
            } else {
                StopReason::EndTurn
            };

            Ok(ChatResponse {
                text: choice.message.content.unwrap_or_default(),
                tool_calls,
                stop,
            })
        })
    }
}
