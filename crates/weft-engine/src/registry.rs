use std::collections::HashMap;
use std::sync::Arc;

use weft_core::types::NodeKind;
use weft_llm::Provider;

use crate::agent::AgentExecutor;
use crate::executor::NodeExecutor;
use crate::executors::http::HttpRequestExecutor;
use crate::executors::llm::LlmExecutor;
use crate::executors::trigger::TriggerExecutor;
use crate::executors::webhook::WebhookExecutor;

/// Mapping from node kind to executor. Dispatch is explicit; kinds without
/// an entry fail the run with `UnknownNodeKind`.
pub struct ExecutorRegistry {
    executors: HashMap<NodeKind, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: NodeKind, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(kind, executor);
    }

    pub fn get(&self, kind: NodeKind) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<NodeKind> {
        self.executors.keys().copied().collect()
    }

    /// The built-in executor set. Sub-node-only kinds (chat model, memory,
    /// and the tool kinds) have no main-flow executor on purpose: wiring one
    /// into the main flow is a configuration mistake and fails the run.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        let trigger: Arc<dyn NodeExecutor> = Arc::new(TriggerExecutor);
        registry.register(NodeKind::Initial, trigger.clone());
        registry.register(NodeKind::ManualTrigger, trigger.clone());
        registry.register(NodeKind::GoogleFormTrigger, trigger.clone());
        registry.register(NodeKind::StripeTrigger, trigger);

        registry.register(NodeKind::HttpRequest, Arc::new(HttpRequestExecutor));

        registry.register(NodeKind::Gemini, Arc::new(LlmExecutor::new(Provider::Gemini)));
        registry.register(NodeKind::Openai, Arc::new(LlmExecutor::new(Provider::Openai)));
        registry.register(
            NodeKind::Anthropic,
            Arc::new(LlmExecutor::new(Provider::Anthropic)),
        );

        registry.register(
            NodeKind::Discord,
            Arc::new(WebhookExecutor::new(NodeKind::Discord)),
        );
        registry.register(NodeKind::Slack, Arc::new(WebhookExecutor::new(NodeKind::Slack)));

        registry.register(NodeKind::AiAgent, Arc::new(AgentExecutor));

        registry
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
