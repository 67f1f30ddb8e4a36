use regex::Regex;
use serde_json::Value;

use weft_core::context::RunContext;

/// Render a user template against the run context.
///
/// Two forms are recognised:
/// - `{{path.to.value}}` — dotted lookup, stringified as a JSON scalar
///   (strings render raw, without quotes);
/// - `{{json path}}` — the subtree pretty-printed as JSON.
///
/// Unknown paths render as the empty string. Templates never execute code,
/// and nothing is HTML-escaped: output feeds JSON bodies and prompts, not
/// markup.
pub fn render(template: &str, context: &RunContext) -> String {
    let re = Regex::new(
        r"\{\{\s*(?P<json>json\s+)?(?P<path>[A-Za-z_$][A-Za-z0-9_$]*(?:\.[A-Za-z0-9_$]+)*)\s*\}\}",
    )
    .expect("template pattern compiles");

    re.replace_all(template, |caps: &regex::Captures<'_>| {
        let path = &caps["path"];
        let value = match context.get_path(path) {
            Some(value) => value,
            None => return String::new(),
        };
        if caps.name("json").is_some() {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            scalar(value)
        }
    })
    .into_owned()
}

/// JSON-scalar stringification: strings raw, everything else as its JSON
/// text.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
