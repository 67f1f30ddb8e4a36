use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WeftError};

/// Owning tenant identifier. Opaque; no numeric assumptions.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct OrgId(pub String);

impl OrgId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrgId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workflow identifier, unique within the store.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for one execution of a workflow.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_str(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Node kind — closed set. Determines which executor runs the node and how
/// its `data` map is interpreted.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Initial,
    ManualTrigger,
    HttpRequest,
    GoogleFormTrigger,
    StripeTrigger,
    Gemini,
    Anthropic,
    Openai,
    Discord,
    Slack,
    AiAgent,
    ChatModel,
    Memory,
    SendEmail,
    WebScraper,
    Calculator,
    InventoryLookup,
    OrderManager,
}

impl NodeKind {
    /// Trigger nodes are the plan's entry points.
    pub fn is_trigger(&self) -> bool {
        matches!(
            self,
            NodeKind::Initial
                | NodeKind::ManualTrigger
                | NodeKind::GoogleFormTrigger
                | NodeKind::StripeTrigger
        )
    }

    /// The stored wire name, e.g. `AI_AGENT`.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Initial => "INITIAL",
            NodeKind::ManualTrigger => "MANUAL_TRIGGER",
            NodeKind::HttpRequest => "HTTP_REQUEST",
            NodeKind::GoogleFormTrigger => "GOOGLE_FORM_TRIGGER",
            NodeKind::StripeTrigger => "STRIPE_TRIGGER",
            NodeKind::Gemini => "GEMINI",
            NodeKind::Anthropic => "ANTHROPIC",
            NodeKind::Openai => "OPENAI",
            NodeKind::Discord => "DISCORD",
            NodeKind::Slack => "SLACK",
            NodeKind::AiAgent => "AI_AGENT",
            NodeKind::ChatModel => "CHAT_MODEL",
            NodeKind::Memory => "MEMORY",
            NodeKind::SendEmail => "SEND_EMAIL",
            NodeKind::WebScraper => "WEB_SCRAPER",
            NodeKind::Calculator => "CALCULATOR",
            NodeKind::InventoryLookup => "INVENTORY_LOOKUP",
            NodeKind::OrderManager => "ORDER_MANAGER",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Credential kind — closed set.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialKind {
    Openai,
    Anthropic,
    Gemini,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Openai => "OPENAI",
            CredentialKind::Anthropic => "ANTHROPIC",
            CredentialKind::Gemini => "GEMINI",
        }
    }
}

/// Edge handle label. `Main` edges participate in scheduling; the rest bind
/// sub-nodes to a specific executor at run time.
///
/// Stored graphs carry the label as a free string; the aliases `""`, `"main"`
/// and `"target-1"` all mean main flow.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Port {
    Main,
    ChatModel,
    Memory,
    Tool,
    Other(String),
}

impl Port {
    pub fn parse(label: &str) -> Self {
        match label {
            "" | "main" | "target-1" => Port::Main,
            "chat-model-target" => Port::ChatModel,
            "memory-target" => Port::Memory,
            "tool-target" => Port::Tool,
            other => Port::Other(other.to_string()),
        }
    }

    /// Canonical stored label.
    pub fn as_label(&self) -> &str {
        match self {
            Port::Main => "main",
            Port::ChatModel => "chat-model-target",
            Port::Memory => "memory-target",
            Port::Tool => "tool-target",
            Port::Other(label) => label,
        }
    }

    pub fn is_main(&self) -> bool {
        matches!(self, Port::Main)
    }
}

impl From<String> for Port {
    fn from(s: String) -> Self {
        Port::parse(&s)
    }
}

impl From<Port> for String {
    fn from(p: Port) -> Self {
        p.as_label().to_string()
    }
}

/// 2-D editor coordinate. Opaque to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A vertex in a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique within the workflow.
    pub id: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    /// Free-form configuration; interpretation is determined by `kind`.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Reference into the credential store, same organization.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            position: Position::default(),
            data: serde_json::Value::Object(serde_json::Map::new()),
            credential_id: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_credential(mut self, credential_id: impl Into<String>) -> Self {
        self.credential_id = Some(credential_id.into());
        self
    }

    /// Read a string field from the configuration map.
    pub fn data_str(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(|v| v.as_str())
    }

    /// Read a string field, failing with a configuration error naming the
    /// node kind and the missing field.
    pub fn require_str(&self, field: &str) -> Result<&str> {
        self.data_str(field).ok_or_else(|| WeftError::MissingConfig {
            kind: self.kind.as_str().to_string(),
            field: field.to_string(),
        })
    }

    pub fn data_u64(&self, field: &str) -> Option<u64> {
        self.data.get(field).and_then(|v| v.as_u64())
    }
}

/// A directed edge between two nodes of the same workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: String,
    pub from_node_id: String,
    pub to_node_id: String,
    #[serde(default)]
    pub from_output: String,
    #[serde(default = "default_to_input")]
    pub to_input: Port,
}

fn default_to_input() -> Port {
    Port::Main
}

impl Connection {
    pub fn main(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from_node_id: from.into(),
            to_node_id: to.into(),
            from_output: "main".into(),
            to_input: Port::Main,
        }
    }

    pub fn sub(
        id: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        port: Port,
    ) -> Self {
        Self {
            id: id.into(),
            from_node_id: from.into(),
            to_node_id: to.into(),
            from_output: "main".into(),
            to_input: port,
        }
    }
}

/// A named graph owned by an organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub org_id: OrgId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl Workflow {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Connections arriving at `node_id` (sub-node bindings included).
    pub fn incoming<'a, 'b>(
        &'a self,
        node_id: &'b str,
    ) -> impl Iterator<Item = &'a Connection> + use<'a, 'b> {
        self.connections.iter().filter(move |c| c.to_node_id == node_id)
    }
}

/// Conversation role at the history boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of conversation history, stored inside the run context under a
/// user-chosen key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Validate a user-chosen output binding. Checked at configuration time.
pub fn validate_variable_name(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid_head = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if valid_head && valid_tail {
        Ok(())
    } else {
        Err(WeftError::InvalidVariableName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_kind_wire_names() {
        let json = serde_json::to_string(&NodeKind::AiAgent).unwrap();
        assert_eq!(json, "\"AI_AGENT\"");
        let parsed: NodeKind = serde_json::from_str("\"HTTP_REQUEST\"").unwrap();
        assert_eq!(parsed, NodeKind::HttpRequest);
        assert_eq!(NodeKind::GoogleFormTrigger.as_str(), "GOOGLE_FORM_TRIGGER");
    }

    #[test]
    fn test_trigger_kinds() {
        assert!(NodeKind::Initial.is_trigger());
        assert!(NodeKind::ManualTrigger.is_trigger());
        assert!(NodeKind::GoogleFormTrigger.is_trigger());
        assert!(NodeKind::StripeTrigger.is_trigger());
        assert!(!NodeKind::HttpRequest.is_trigger());
        assert!(!NodeKind::AiAgent.is_trigger());
    }

    #[test]
    fn test_port_aliases() {
        assert_eq!(Port::parse(""), Port::Main);
        assert_eq!(Port::parse("main"), Port::Main);
        assert_eq!(Port::parse("target-1"), Port::Main);
        assert_eq!(Port::parse("chat-model-target"), Port::ChatModel);
        assert_eq!(Port::parse("memory-target"), Port::Memory);
        assert_eq!(Port::parse("tool-target"), Port::Tool);
        assert_eq!(
            Port::parse("custom-handle"),
            Port::Other("custom-handle".into())
        );
    }

    #[test]
    fn test_port_serde_roundtrip() {
        let conn = Connection::sub("c1", "model", "agent", Port::ChatModel);
        let json = serde_json::to_string(&conn).unwrap();
        assert!(json.contains("chat-model-target"));
        let parsed: Connection = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.to_input, Port::ChatModel);
    }

    #[test]
    fn test_connection_deserializes_stored_alias() {
        let json = r#"{
            "id": "c1",
            "fromNodeId": "a",
            "toNodeId": "b",
            "fromOutput": "main",
            "toInput": "target-1"
        }"#;
        let conn: Connection = serde_json::from_str(json).unwrap();
        assert!(conn.to_input.is_main());
    }

    #[test]
    fn test_require_str_error_names_kind_and_field() {
        let node = Node::new("n1", NodeKind::HttpRequest);
        let err = node.require_str("url").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("HTTP_REQUEST"));
        assert!(msg.contains("url"));
    }

    #[test]
    fn test_variable_name_validation() {
        assert!(validate_variable_name("result").is_ok());
        assert!(validate_variable_name("_x9").is_ok());
        assert!(validate_variable_name("$out").is_ok());
        assert!(validate_variable_name("9lives").is_err());
        assert!(validate_variable_name("").is_err());
        assert!(validate_variable_name("has space").is_err());
        assert!(validate_variable_name("dash-ed").is_err());
    }

    #[test]
    fn test_workflow_lookup() {
        let wf = Workflow {
            id: WorkflowId::new("w1"),
            org_id: OrgId::new("org1"),
            name: "test".into(),
            description: None,
            nodes: vec![Node::new("a", NodeKind::Initial), Node::new("b", NodeKind::HttpRequest)],
            connections: vec![Connection::main("c1", "a", "b")],
        };
        assert!(wf.node("a").is_some());
        assert!(wf.node("missing").is_none());
        assert_eq!(wf.incoming("b").count(), 1);
        assert_eq!(wf.incoming("a").count(), 0);
    }
}
