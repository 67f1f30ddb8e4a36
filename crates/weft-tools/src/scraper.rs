use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use weft_core::error::Result;

use crate::{parse_input, truncate, Tool, ToolOutcome};

pub const DEFAULT_MAX_LENGTH: usize = 5_000;

/// Web scraper tool: fetches a URL, strips HTML, collapses whitespace, and
/// truncates to the configured length.
pub struct WebScraperTool {
    max_length: usize,
}

impl WebScraperTool {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }
}

impl Default for WebScraperTool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

#[derive(Deserialize)]
struct WebScraperInput {
    url: String,
}

impl Tool for WebScraperTool {
    fn name(&self) -> &str {
        "web_scraper"
    }

    fn description(&self) -> &str {
        "Fetch a web page and return its visible text content with HTML removed."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "url": { "type": "string", "description": "The URL to scrape" }
            },
            "required": ["url"]
        })
    }

    fn execute<'a>(&'a self, input: serde_json::Value) -> BoxFuture<'a, Result<ToolOutcome>> {
        Box::pin(async move {
            let params: WebScraperInput = parse_input(self.name(), input)?;

            let client = match reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("weft/0.1")
                .build()
            {
                Ok(client) => client,
                Err(e) => return Ok(ToolOutcome::error(format!("Error: {}", e))),
            };

            debug!(url = %params.url, "web_scraper tool call");
            let response = match client.get(&params.url).send().await {
                Ok(response) => response,
                Err(e) => return Ok(ToolOutcome::error(format!("Error: fetch failed: {}", e))),
            };

            let status = response.status();
            if !status.is_success() {
                return Ok(ToolOutcome::error(format!(
                    "Error: HTTP {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("")
                )));
            }

            let body = response.text().await.unwrap_or_default();
            let text = strip_html(&body);
            Ok(ToolOutcome::success(truncate(&text, self.max_length)))
        })
    }
}

/// Strip HTML down to visible text: script/style blocks removed, tags
/// removed, entities decoded, whitespace collapsed.
pub fn strip_html(html: &str) -> String {
    let re_script = regex::Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    let cleaned = re_script.replace_all(html, " ");
    let re_style = regex::Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    let cleaned = re_style.replace_all(&cleaned, " ");

    let re_tags = regex::Regex::new(r"<[^>]+>").unwrap();
    let text = re_tags.replace_all(&cleaned, " ");

    let text = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    let re_whitespace = regex::Regex::new(r"\s+").unwrap();
    re_whitespace.replace_all(&text, " ").trim().to_string()
}
