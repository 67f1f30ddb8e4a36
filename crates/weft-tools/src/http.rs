use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use weft_core::error::Result;

use crate::{parse_input, truncate, Tool, ToolOutcome};

const RESPONSE_LIMIT: usize = 5_000;
const ALLOWED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

/// HTTP request tool: the model supplies url, method, and an optional body.
pub struct HttpRequestTool;

#[derive(Deserialize)]
struct HttpRequestInput {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    body: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

impl Tool for HttpRequestTool {
    fn name(&self) -> &str {
        "http_request"
    }

    fn description(&self) -> &str {
        "Make an HTTP request to a URL. Returns the status line and response body."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The URL to request" },
                "method": {
                    "type": "string",
                    "enum": ALLOWED_METHODS,
                    "description": "HTTP method (default: GET)"
                },
                "body": { "type": "string", "description": "Request body for POST/PUT/PATCH" }
            },
            "required": ["url"]
        })
    }

    fn execute<'a>(&'a self, input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>> {
        Box::pin(async move {
            let params: HttpRequestInput = parse_input(self.name(), input)?;

            let method = params.method.to_uppercase();
            if !ALLOWED_METHODS.contains(&method.as_str()) {
                return Ok(ToolOutcome::error(format!(
                    "Error: method '{}' is not allowed",
                    params.method
                )));
            }

            let client = match reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
            {
                Ok(client) => client,
                Err(e) => return Ok(ToolOutcome::error(format!("Error: {}", e))),
            };

            debug!(url = %params.url, method = %method, "http_request tool call");
            let method = method
                .parse::<reqwest::Method>()
                .expect("allow-listed method parses");
            let mut request = client.request(method, &params.url);
            if let Some(body) = params.body {
                request = request
                    .header("content-type", "application/json")
                    .body(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    Ok(ToolOutcome::success(format!(
                        "HTTP {} {}\n\n{}",
                        status.as_u16(),
                        status.canonical_reason().unwrap_or(""),
                        truncate(&body, RESPONSE_LIMIT)
                    )))
                }
                Err(e) => Ok(ToolOutcome::error(format!("Error: request failed: {}", e))),
            }
        })
    }
}
