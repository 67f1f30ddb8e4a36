use weft_core::context::RunContext;
use weft_core::types::{ChatTurn, Node};

pub const DEFAULT_WINDOW_SIZE: usize = 10;
pub const DEFAULT_MEMORY_KEY: &str = "chatHistory";

/// Memory sub-node settings.
#[derive(Debug, Clone)]
pub struct MemorySettings {
    pub window_size: usize,
    pub memory_key: String,
}

impl MemorySettings {
    pub fn from_node(node: &Node) -> Self {
        Self {
            window_size: node
                .data_u64("windowSize")
                .map(|n| n as usize)
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_WINDOW_SIZE),
            memory_key: node
                .data_str("memoryKey")
                .unwrap_or(DEFAULT_MEMORY_KEY)
                .to_string(),
        }
    }
}

/// Read the stored history list from the context. Entries that do not parse
/// as `{role, content}` are skipped rather than failing the run.
pub fn history_from_context(context: &RunContext, key: &str) -> Vec<ChatTurn> {
    context
        .get(key)
        .and_then(|value| value.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// The last `window_size` turns, used as the model's prior messages.
pub fn window(history: &[ChatTurn], window_size: usize) -> &[ChatTurn] {
    let start = history.len().saturating_sub(window_size);
    &history[start..]
}

/// Append the new exchange and truncate to `2 × window_size` turns, keeping
/// the most recent.
pub fn append_and_trim(
    mut history: Vec<ChatTurn>,
    user: &str,
    assistant: &str,
    window_size: usize,
) -> Vec<ChatTurn> {
    history.push(ChatTurn::user(user));
    history.push(ChatTurn::assistant(assistant));
    let keep = 2 * window_size;
    if history.len() > keep {
        history.drain(..history.len() - keep);
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weft_core::types::NodeKind;

    #[test]
    fn test_settings_defaults() {
        let node = Node::new("mem", NodeKind::Memory);
        let settings = MemorySettings::from_node(&node);
        assert_eq!(settings.window_size, 10);
        assert_eq!(settings.memory_key, "chatHistory");
    }

    #[test]
    fn test_settings_from_data() {
        let node = Node::new("mem", NodeKind::Memory)
            .with_data(json!({"windowSize": 2, "memoryKey": "talk"}));
        let settings = MemorySettings::from_node(&node);
        assert_eq!(settings.window_size, 2);
        assert_eq!(settings.memory_key, "talk");
    }

    #[test]
    fn test_zero_window_falls_back_to_default() {
        let node = Node::new("mem", NodeKind::Memory).with_data(json!({"windowSize": 0}));
        assert_eq!(MemorySettings::from_node(&node).window_size, 10);
    }

    #[test]
    fn test_history_parsing_is_tolerant() {
        let ctx = RunContext::new().with(
            "chatHistory",
            json!([
                {"role": "user", "content": "hi"},
                {"not": "a turn"},
                {"role": "assistant", "content": "hello"},
            ]),
        );
        let history = history_from_context(&ctx, "chatHistory");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ChatTurn::user("hi"));
    }

    #[test]
    fn test_missing_history_is_empty() {
        let ctx = RunContext::new();
        assert!(history_from_context(&ctx, "chatHistory").is_empty());
        let ctx = ctx.with("chatHistory", json!("not a list"));
        assert!(history_from_context(&ctx, "chatHistory").is_empty());
    }

    #[test]
    fn test_window_takes_most_recent() {
        let history = vec![
            ChatTurn::user("p1"),
            ChatTurn::assistant("a1"),
            ChatTurn::user("p2"),
            ChatTurn::assistant("a2"),
        ];
        let tail = window(&history, 2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0], ChatTurn::user("p2"));

        assert_eq!(window(&history, 10).len(), 4);
    }

    #[test]
    fn test_append_and_trim_bounds_history() {
        let window_size = 2;
        let mut history = Vec::new();
        for round in 1..=3 {
            history = append_and_trim(
                history,
                &format!("p{}", round),
                &format!("a{}", round),
                window_size,
            );
        }
        // Three exchanges, trimmed to 2 × windowSize = 4 turns: p2/a2, p3/a3.
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], ChatTurn::user("p2"));
        assert_eq!(history[3], ChatTurn::assistant("a3"));
    }

    #[test]
    fn test_latest_turns_are_the_new_exchange() {
        let history = append_and_trim(Vec::new(), "question", "answer", 5);
        assert_eq!(history[history.len() - 2], ChatTurn::user("question"));
        assert_eq!(history[history.len() - 1], ChatTurn::assistant("answer"));
    }
}
