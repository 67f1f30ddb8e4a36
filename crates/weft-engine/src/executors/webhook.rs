use futures::future::BoxFuture;
use serde_json::json;
use tracing::debug;

use weft_core::context::RunContext;
use weft_core::error::{Result, WeftError};
use weft_core::status::NodeStatus;
use weft_core::types::{validate_variable_name, NodeKind};

use crate::executor::{ExecutorContext, NodeExecutor};

/// Outbound chat webhook node (DISCORD / SLACK): posts the templated content
/// to the configured webhook URL and writes `{messageContent}` under the
/// variable name.
pub struct WebhookExecutor {
    kind: NodeKind,
}

impl WebhookExecutor {
    pub fn new(kind: NodeKind) -> Self {
        Self { kind }
    }
}

impl NodeExecutor for WebhookExecutor {
    fn execute<'a>(&'a self, ctx: ExecutorContext<'a>) -> BoxFuture<'a, Result<Option<RunContext>>> {
        Box::pin(async move {
            ctx.emit(NodeStatus::Loading);

            let webhook_url = ctx.node.require_str("webhookUrl")?.to_string();
            let content_template = ctx.node.require_str("content")?;
            let variable = ctx.node.require_str("variableName")?.to_string();
            validate_variable_name(&variable)?;

            let content = ctx.render(content_template);

            let payload = match self.kind {
                NodeKind::Discord => {
                    let mut body = json!({ "content": content });
                    if let Some(username) = ctx.node.data_str("username") {
                        body["username"] = json!(username);
                    }
                    body
                }
                // Slack incoming webhooks take `text`.
                _ => json!({ "text": content }),
            };

            debug!(node_id = %ctx.node.id, kind = %self.kind, "webhook post");

            let http = ctx.services.http.clone();
            ctx.step("post", {
                Box::pin(async move {
                    let response = http
                        .post(&webhook_url)
                        .json(&payload)
                        .send()
                        .await
                        .map_err(|e| WeftError::Http(e.to_string()))?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(WeftError::Http(format!(
                            "webhook returned {}",
                            status.as_u16()
                        )));
                    }
                    Ok(json!({ "delivered": true }))
                })
            })
            .await?;

            let new_context = ctx
                .context
                .with(variable, json!({ "messageContent": content }));
            ctx.emit(NodeStatus::Success);
            Ok(Some(new_context))
        })
    }
}
