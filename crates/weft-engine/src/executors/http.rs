use futures::future::BoxFuture;
use serde_json::{json, Value};
use tracing::debug;

use weft_core::context::RunContext;
use weft_core::error::{Result, WeftError};
use weft_core::status::NodeStatus;
use weft_core::types::validate_variable_name;

use crate::executor::{ExecutorContext, NodeExecutor};

const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

/// HTTP_REQUEST node: calls the configured URL and writes
/// `{httpResponse: {status, statusText, data}}` under the variable name.
/// `data` is parsed JSON when the response says it is JSON, otherwise text.
pub struct HttpRequestExecutor;

impl NodeExecutor for HttpRequestExecutor {
    fn execute<'a>(&'a self, ctx: ExecutorContext<'a>) -> BoxFuture<'a, Result<Option<RunContext>>> {
        Box::pin(async move {
            ctx.emit(NodeStatus::Loading);

            let url_template = ctx.node.require_str("url")?;
            let variable = ctx.node.require_str("variableName")?.to_string();
            validate_variable_name(&variable)?;

            let method = ctx
                .node
                .data_str("method")
                .unwrap_or("GET")
                .to_uppercase();
            if !ALLOWED_METHODS.contains(&method.as_str()) {
                return Err(WeftError::InvalidConfig {
                    kind: ctx.node.kind.as_str().into(),
                    message: format!("method '{}' is not allowed", method),
                });
            }

            let url = ctx.render(url_template);
            let body = ctx.node.data_str("body").map(|b| ctx.render(b));
            let headers: Vec<(String, String)> = ctx
                .node
                .data
                .get("headers")
                .and_then(|v| v.as_object())
                .map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                        .collect()
                })
                .unwrap_or_default();

            debug!(node_id = %ctx.node.id, url = %url, method = %method, "http request node");

            let http = ctx.services.http.clone();
            let response = ctx
                .step("request", {
                    let url = url.clone();
                    let method = method.clone();
                    Box::pin(async move {
                        let method = method
                            .parse::<reqwest::Method>()
                            .expect("allow-listed method parses");
                        let mut request = http.request(method, &url);
                        for (key, value) in &headers {
                            request = request.header(key.as_str(), value.as_str());
                        }
                        if let Some(body) = body {
                            request = request
                                .header("content-type", "application/json")
                                .body(body);
                        }

                        let response = request
                            .send()
                            .await
                            .map_err(|e| WeftError::Http(e.to_string()))?;

                        let status = response.status();
                        let is_json = response
                            .headers()
                            .get("content-type")
                            .and_then(|v| v.to_str().ok())
                            .is_some_and(|ct| ct.contains("json"));
                        let text = response
                            .text()
                            .await
                            .map_err(|e| WeftError::Http(e.to_string()))?;

                        let data: Value = if is_json {
                            serde_json::from_str(&text).unwrap_or(Value::String(text))
                        } else {
                            Value::String(text)
                        };

                        Ok(json!({
                            "status": status.as_u16(),
                            "statusText": status.canonical_reason().unwrap_or(""),
                            "data": data,
                        }))
                    })
                })
                .await?;

            let new_context = ctx
                .context
                .with(variable, json!({ "httpResponse": response }));
            ctx.emit(NodeStatus::Success);
            Ok(Some(new_context))
        })
    }
}
