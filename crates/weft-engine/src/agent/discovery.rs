use weft_core::types::{Node, Port, Workflow};

/// The star-shaped local sub-graph around one agent node, discovered at run
/// time from incoming edge labels.
pub struct AgentWiring<'a> {
    pub chat_model: Option<&'a Node>,
    pub memory: Option<&'a Node>,
    pub tools: Vec<&'a Node>,
}

impl AgentWiring<'_> {
    /// All discovered sub-node ids, for the status fan-out.
    pub fn sub_node_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        if let Some(node) = self.chat_model {
            ids.push(node.id.as_str());
        }
        if let Some(node) = self.memory {
            ids.push(node.id.as_str());
        }
        ids.extend(self.tools.iter().map(|n| n.id.as_str()));
        ids
    }
}

/// Partition the agent's incoming connections by edge label and resolve the
/// source nodes. Connections are walked in id order so duplicate chat-model
/// or memory bindings resolve deterministically (first id wins).
pub fn discover<'a>(workflow: &'a Workflow, agent_id: &str) -> AgentWiring<'a> {
    let mut incoming: Vec<_> = workflow.incoming(agent_id).collect();
    incoming.sort_by(|a, b| a.id.cmp(&b.id));

    let mut wiring = AgentWiring {
        chat_model: None,
        memory: None,
        tools: Vec::new(),
    };

    for conn in incoming {
        let Some(source) = workflow.node(&conn.from_node_id) else {
            continue;
        };
        match conn.to_input {
            Port::ChatModel => {
                if wiring.chat_model.is_none() {
                    wiring.chat_model = Some(source);
                }
            }
            Port::Memory => {
                if wiring.memory.is_none() {
                    wiring.memory = Some(source);
                }
            }
            Port::Tool => wiring.tools.push(source),
            Port::Main | Port::Other(_) => {}
        }
    }

    wiring
}
