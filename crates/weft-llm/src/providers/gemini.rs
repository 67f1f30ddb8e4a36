use futures::future::BoxFuture;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use weft_core::error::{Result, WeftError};

use crate::{ChatClient, ChatMessage, ChatRequest, ChatResponse, ContentBlock, Role, StopReason, ToolCall};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Google Gemini native API client (generateContent, non-streaming).
pub struct GeminiClient {
    http: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
        }
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiToolDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFnCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFnResp,
    },
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiFnCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug)]
struct GeminiFnResp {
    name: String,
    response: serde_json::Value,
}

#[derive(Serialize)]
struct GeminiToolDecl {
    function_declarations: Vec<GeminiFnDecl>,
}

#[derive(Serialize)]
struct GeminiFnDecl {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

// ── Response types ───────────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize, Debug)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

// ── Conversion ───────────────────────────────────────────────────

fn convert_messages(messages: Vec<ChatMessage>) -> Vec<GeminiContent> {
    let mut contents = Vec::new();
    for msg in messages {
        let role = match msg.role {
            Role::User => "user",
            Role::Assistant => "model",
        };
        let mut parts = Vec::new();
        for block in msg.content {
            match block {
                ContentBlock::Text { text } => parts.push(GeminiPart::Text { text }),
                ContentBlock::ToolUse { name, input, .. } => parts.push(GeminiPart::FunctionCall {
                    function_call: GeminiFnCall { name, args: input },
                }),
                ContentBlock::ToolResult { name, content, .. } => {
                    parts.push(GeminiPart::FunctionResponse {
                        function_response: GeminiFnResp {
                            name,
                            response: serde_json::json!({ "result": content }),
                        },
                    })
                }
            }
        }
        if !parts.is_empty() {
            contents.push(GeminiContent {
                role: Some(role.to_string()),
                parts,
            });
        }
    }
    contents
}

impl ChatClient for GeminiClient {
    fn complete<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, Result<ChatResponse>> {
        Box::pin(async move {
            let url = format!(
                "{}/{}:generateContent?key={}",
                GEMINI_API_BASE, request.model, self.api_key
            );

            let tools = if request.tools.is_empty() {
                vec![]
            } else {
                vec![GeminiToolDecl {
                    function_declarations: request
                        .tools
                        .iter()
                        .map(|t| GeminiFnDecl {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        })
                        .collect(),
                }]
            };

            let body = GeminiRequest {
                contents: convert_messages(request.messages),
                system_instruction: request.system.map(|text| GeminiContent {
                    role: None,
                    parts: vec![GeminiPart::Text { text }],
                }),
                tools,
                generation_config: Some(GenerationConfig {
                    max_output_tokens: request.max_tokens,
                }),
            };

            debug!(model = %request.model, "gemini generateContent");
            let response = self
                .http
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| WeftError::Llm(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let detail = response.text().await.unwrap_or_default();
                return Err(WeftError::Llm(format!(
                    "gemini returned {}: {}",
                    status.as_u16(),
                    detail.chars().take(500).collect::<String>()
                )));
            }

            let parsed: GeminiResponse = response
                .json()
                .await
                .map_err(|e| WeftError::Llm(format!("gemini response parse error: {}", e)))?;

            let candidate = parsed
                .candidates
                .into_iter()
                .next()
                .ok_or_else(|| WeftError::Llm("gemini returned no candidates".into()))?;

            let mut text = String::new();
            let mut tool_calls = Vec::new();
            if let Some(content) = candidate.content {
                for part in content.parts {
                    match part {
                        GeminiPart::Text { text: t } => text.push_str(&t),
                        GeminiPart::FunctionCall { function_call } => {
                            // Gemini carries no call ids; the function name
                            // doubles as the id for the result turn.
                            tool_calls.push(ToolCall {
                                id: function_call.name.clone(),
                                name: function_call.name,
                                arguments: function_call.args,
                            });
                        }
                        GeminiPart::FunctionResponse { .. } => {}
                    }
                }
            }

            let stop = if !tool_calls.is_empty() {
                StopReason::ToolUse
            } else if candidate.finish_reason.as_deref() == Some("MAX_TOKENS") {
                StopReason::MaxTokens
            } else {
                StopReason::EndTurn
            };

            Ok(ChatResponse {
                text,
                tool_calls,
                stop,
            })
        })
    }
}
