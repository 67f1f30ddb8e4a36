use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use serde_json::json;

use weft_core::context::RunContext;
use weft_core::error::{Result, WeftError};
use weft_core::status::{NodeStatus, StatusEvent, StatusHub, STATUS_TOPIC};
use weft_core::step::{MemorySteps, StepRuntime};
use weft_core::types::{
    ChatTurn, Connection, CredentialKind, Node, NodeKind, OrgId, Port, Workflow, WorkflowId,
};
use weft_llm::{ChatClient, ChatRequest, ChatResponse, ContentBlock, Provider, StopReason, ToolCall};
use weft_store::{Vault, WorkflowStore};
use weft_engine::{ClientFactory, ExecutorRegistry, RunDriver, Services};

const TEST_KEY: &str = "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef";

/// Chat client that replays a script of responses and records every request.
struct ScriptedClient {
    script: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    fn new(script: Vec<ChatResponse>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl ChatClient for ScriptedClient {
    fn complete<'a>(&'a self, request: ChatRequest) -> BoxFuture<'a, Result<ChatResponse>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request);
            Ok(self.script.lock().unwrap().pop_front().unwrap_or(ChatResponse {
                text: "done".into(),
                tool_calls: vec![],
                stop: StopReason::EndTurn,
            }))
        })
    }
}

struct StubFactory {
    client: Arc<ScriptedClient>,
    providers: Mutex<Vec<Provider>>,
}

impl StubFactory {
    fn new(client: Arc<ScriptedClient>) -> Arc<Self> {
        Arc::new(Self {
            client,
            providers: Mutex::new(Vec::new()),
        })
    }
}

impl ClientFactory for StubFactory {
    fn client(&self, provider: Provider, _api_key: String) -> Arc<dyn ChatClient> {
        self.providers.lock().unwrap().push(provider);
        self.client.clone()
    }
}

fn text_response(text: &str) -> ChatResponse {
    ChatResponse {
        text: text.into(),
        tool_calls: vec![],
        stop: StopReason::EndTurn,
    }
}

fn tool_response(name: &str, arguments: serde_json::Value) -> ChatResponse {
    ChatResponse {
        text: String::new(),
        tool_calls: vec![ToolCall {
            id: format!("call-{}", name),
            name: name.into(),
            arguments,
        }],
        stop: StopReason::ToolUse,
    }
}

struct AgentHarness {
    driver: RunDriver,
    hub: Arc<StatusHub>,
    client: Arc<ScriptedClient>,
    factory: Arc<StubFactory>,
    store: Arc<WorkflowStore>,
    org: OrgId,
}

fn agent_harness(script: Vec<ChatResponse>) -> AgentHarness {
    let client = ScriptedClient::new(script);
    let factory = StubFactory::new(client.clone());

    let store = Arc::new(WorkflowStore::in_memory(Vault::new(TEST_KEY).unwrap()).unwrap());
    let org = OrgId::new("org-1");
    store.insert_organization(&org, "Acme").unwrap();
    store
        .insert_credential(&org, "cred-1", CredentialKind::Gemini, "gemini key", "sk-test")
        .unwrap();

    let services = Services::new()
        .with_store(store.clone())
        .with_clients(factory.clone());
    let hub = Arc::new(StatusHub::default());
    let driver = RunDriver::new(
        Arc::new(ExecutorRegistry::with_builtins()),
        services,
        hub.publisher(STATUS_TOPIC),
    );

    AgentHarness {
        driver,
        hub,
        client,
        factory,
        store,
        org,
    }
}

/// Trigger → agent, with the given sub-nodes hanging off the agent.
fn agent_workflow(agent_data: serde_json::Value, sub_nodes: Vec<(Node, Port)>) -> Workflow {
    let mut nodes = vec![
        Node::new("t", NodeKind::ManualTrigger),
        Node::new("agent", NodeKind::AiAgent).with_data(agent_data),
    ];
    let mut connections = vec![Connection::main("c-main", "t", "agent")];
    for (index, (node, port)) in sub_nodes.into_iter().enumerate() {
        connections.push(Connection::sub(
            format!("c-sub-{}", index),
            node.id.clone(),
            "agent",
            port,
        ));
        nodes.push(node);
    }
    Workflow {
        id: WorkflowId::new("wf-agent"),
        org_id: OrgId::new("org-1"),
        name: "agent test".into(),
        description: None,
        nodes,
        connections,
    }
}

fn chat_model_node() -> Node {
    Node::new("model", NodeKind::ChatModel)
        .with_data(json!({"provider": "gemini"}))
        .with_credential("cred-1")
}

async fn run(harness: &AgentHarness, workflow: &Workflow, initial: RunContext) -> Result<RunContext> {
    let steps: Arc<dyn StepRuntime> = Arc::new(MemorySteps::new());
    harness.driver.execute(workflow, initial, steps).await
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<StatusEvent>) -> Vec<StatusEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_agent_calculator_tool_loop() {
    let harness = agent_harness(vec![
        tool_response("calculator", json!({"expression": "sqrt(144) + 3"})),
        text_response("The answer is 15."),
    ]);
    let wf = agent_workflow(
        json!({
            "variableName": "agent",
            "userPrompt": "what is sqrt(144) + 3?",
            "maxIterations": 3
        }),
        vec![
            (chat_model_node(), Port::ChatModel),
            (Node::new("calc", NodeKind::Calculator), Port::Tool),
        ],
    );

    let context = run(&harness, &wf, RunContext::new()).await.unwrap();

    let answer = context.get_path("agent.agentResponse").unwrap();
    assert!(answer.as_str().unwrap().contains("15"));
    let count = context.get_path("agent.toolCallCount").unwrap().as_u64().unwrap();
    assert!(count >= 1);

    // The tool result was fed back to the model on the second round.
    let requests = harness.client.requests();
    assert_eq!(requests.len(), 2);
    let fed_back = requests[1]
        .messages
        .iter()
        .flat_map(|m| m.content.iter())
        .any(|block| {
            matches!(block, ContentBlock::ToolResult { content, is_error, .. }
                if content == "15" && !is_error)
        });
    assert!(fed_back, "calculator result must reach the model");
}

#[tokio::test]
async fn test_single_iteration_no_tools() {
    let harness = agent_harness(vec![text_response("hello")]);
    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "hi", "maxIterations": 1}),
        vec![(chat_model_node(), Port::ChatModel)],
    );

    let context = run(&harness, &wf, RunContext::new()).await.unwrap();
    assert_eq!(harness.client.calls(), 1);
    assert_eq!(
        context.get_path("agent.toolCallCount").unwrap().as_u64(),
        Some(0)
    );
    assert_eq!(
        context.get_path("agent.agentResponse").unwrap().as_str(),
        Some("hello")
    );
}

#[tokio::test]
async fn test_iteration_bound_cuts_the_loop() {
    // The model wants a tool every round; the bound stops it.
    let harness = agent_harness(vec![
        tool_response("calculator", json!({"expression": "1+1"})),
        tool_response("calculator", json!({"expression": "2+2"})),
        tool_response("calculator", json!({"expression": "3+3"})),
        tool_response("calculator", json!({"expression": "4+4"})),
    ]);
    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "keep going", "maxIterations": 2}),
        vec![
            (chat_model_node(), Port::ChatModel),
            (Node::new("calc", NodeKind::Calculator), Port::Tool),
        ],
    );

    let context = run(&harness, &wf, RunContext::new()).await.unwrap();
    assert_eq!(harness.client.calls(), 2);
    assert_eq!(
        context.get_path("agent.toolCallCount").unwrap().as_u64(),
        Some(2)
    );
}

#[tokio::test]
async fn test_memory_window_trimming_across_runs() {
    // windowSize = 2: after three exchanges only the last two survive.
    let memory_node =
        Node::new("mem", NodeKind::Memory).with_data(json!({"windowSize": 2}));

    let mut context = RunContext::new();
    for round in 1..=3 {
        let harness = agent_harness(vec![text_response(&format!("a{}", round))]);
        let wf = agent_workflow(
            json!({"variableName": "agent", "userPrompt": format!("p{}", round)}),
            vec![
                (chat_model_node(), Port::ChatModel),
                (memory_node.clone(), Port::Memory),
            ],
        );
        context = run(&harness, &wf, context).await.unwrap();
    }

    let history: Vec<ChatTurn> =
        serde_json::from_value(context.get("chatHistory").unwrap().clone()).unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0], ChatTurn::user("p2"));
    assert_eq!(history[1], ChatTurn::assistant("a2"));
    assert_eq!(history[2], ChatTurn::user("p3"));
    assert_eq!(history[3], ChatTurn::assistant("a3"));
}

#[tokio::test]
async fn test_prior_history_reaches_the_model() {
    let harness = agent_harness(vec![text_response("recalled")]);
    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "and then?"}),
        vec![
            (chat_model_node(), Port::ChatModel),
            (Node::new("mem", NodeKind::Memory), Port::Memory),
        ],
    );

    let initial = RunContext::new().with(
        "chatHistory",
        json!([
            {"role": "user", "content": "my name is Ada"},
            {"role": "assistant", "content": "hello Ada"},
        ]),
    );
    run(&harness, &wf, initial).await.unwrap();

    let requests = harness.client.requests();
    let texts: Vec<String> = requests[0].messages.iter().map(|m| m.text()).collect();
    assert_eq!(texts, vec!["my name is Ada", "hello Ada", "and then?"]);
}

#[tokio::test]
async fn test_missing_model_is_fatal() {
    let harness = agent_harness(vec![]);
    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "hi"}),
        vec![],
    );
    let err = run(&harness, &wf, RunContext::new()).await.unwrap_err();
    assert!(matches!(err, WeftError::AgentMissingModel(_)));
    assert!(!err.is_retriable());
    assert_eq!(harness.client.calls(), 0);
}

#[tokio::test]
async fn test_model_without_credential_is_missing_model() {
    let harness = agent_harness(vec![]);
    let bare_model = Node::new("model", NodeKind::ChatModel).with_data(json!({"provider": "gemini"}));
    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "hi"}),
        vec![(bare_model, Port::ChatModel)],
    );
    let err = run(&harness, &wf, RunContext::new()).await.unwrap_err();
    assert!(matches!(err, WeftError::AgentMissingModel(_)));
}

#[tokio::test]
async fn test_unresolvable_credential_is_missing_key() {
    let harness = agent_harness(vec![]);
    let model = Node::new("model", NodeKind::ChatModel)
        .with_data(json!({"provider": "gemini"}))
        .with_credential("cred-nope");
    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "hi"}),
        vec![(model, Port::ChatModel)],
    );
    let err = run(&harness, &wf, RunContext::new()).await.unwrap_err();
    assert!(matches!(err, WeftError::AgentMissingKey(_)));
}

#[tokio::test]
async fn test_unknown_provider_falls_back_to_gemini() {
    let harness = agent_harness(vec![text_response("ok")]);
    let model = Node::new("model", NodeKind::ChatModel)
        .with_data(json!({"provider": "som-novel-lab"}))
        .with_credential("cred-1");
    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "hi"}),
        vec![(model, Port::ChatModel)],
    );
    run(&harness, &wf, RunContext::new()).await.unwrap();

    assert_eq!(*harness.factory.providers.lock().unwrap(), vec![Provider::Gemini]);
    assert_eq!(harness.client.requests()[0].model, "gemini-2.0-flash");
}

#[tokio::test]
async fn test_cross_tenant_order_write_is_refused() {
    let harness = agent_harness(vec![
        tool_response(
            "update_order_status",
            json!({"orderId": "42", "newStatus": "shipped"}),
        ),
        text_response("I could not update order 42: it was not found."),
    ]);

    // Order 42 belongs to a different organization.
    let foreign = OrgId::new("org-2");
    harness.store.insert_organization(&foreign, "Rival").unwrap();
    harness
        .store
        .insert_order(&foreign, "42", "Maya", "pending", 5000)
        .unwrap();

    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "ship order 42"}),
        vec![
            (chat_model_node(), Port::ChatModel),
            (Node::new("om", NodeKind::OrderManager), Port::Tool),
        ],
    );
    let context = run(&harness, &wf, RunContext::new()).await.unwrap();

    // The tool reported the failure to the model...
    let requests = harness.client.requests();
    let refused = requests[1]
        .messages
        .iter()
        .flat_map(|m| m.content.iter())
        .any(|block| {
            matches!(block, ContentBlock::ToolResult { content, is_error, .. }
                if content.starts_with("Error: Order #42 not found") && *is_error)
        });
    assert!(refused);

    // ...the response reflects it, and no write happened.
    let answer = context.get_path("agent.agentResponse").unwrap().as_str().unwrap();
    assert!(answer.contains("not found"));
    let untouched = harness.store.search_orders(&foreign, None, None, 10).unwrap();
    assert_eq!(untouched[0].status, "pending");
}

#[tokio::test]
async fn test_status_fan_out_covers_sub_nodes() {
    let harness = agent_harness(vec![text_response("ok")]);
    let token = harness.hub.issue_token(STATUS_TOPIC, chrono::Duration::seconds(60));
    let mut rx = harness.hub.subscribe(&token).unwrap();

    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "hi"}),
        vec![
            (chat_model_node(), Port::ChatModel),
            (Node::new("mem", NodeKind::Memory), Port::Memory),
            (Node::new("calc", NodeKind::Calculator), Port::Tool),
        ],
    );
    run(&harness, &wf, RunContext::new()).await.unwrap();

    let events = drain(&mut rx);
    for id in ["agent", "model", "mem", "calc"] {
        let statuses: Vec<NodeStatus> = events
            .iter()
            .filter(|e| e.node_id == id)
            .map(|e| e.status)
            .collect();
        assert_eq!(
            statuses,
            vec![NodeStatus::Loading, NodeStatus::Success],
            "bad status pair for {id}"
        );
    }
}

#[tokio::test]
async fn test_agent_failure_fans_error_to_sub_nodes() {
    let harness = agent_harness(vec![]);
    let token = harness.hub.issue_token(STATUS_TOPIC, chrono::Duration::seconds(60));
    let mut rx = harness.hub.subscribe(&token).unwrap();

    // Model sub-node present but unkeyed: the run fails after discovery.
    let model = Node::new("model", NodeKind::ChatModel)
        .with_data(json!({"provider": "gemini"}))
        .with_credential("cred-nope");
    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "hi"}),
        vec![
            (model, Port::ChatModel),
            (Node::new("calc", NodeKind::Calculator), Port::Tool),
        ],
    );
    run(&harness, &wf, RunContext::new()).await.unwrap_err();

    let events = drain(&mut rx);
    for id in ["agent", "model", "calc"] {
        let statuses: Vec<NodeStatus> = events
            .iter()
            .filter(|e| e.node_id == id)
            .map(|e| e.status)
            .collect();
        assert_eq!(
            statuses,
            vec![NodeStatus::Loading, NodeStatus::Error],
            "bad status pair for {id}"
        );
    }
}

#[tokio::test]
async fn test_prompt_is_templated_from_context() {
    let harness = agent_harness(vec![text_response("ok")]);
    let wf = agent_workflow(
        json!({"variableName": "agent", "userPrompt": "summarise: {{r.httpResponse.data.id}}"}),
        vec![(chat_model_node(), Port::ChatModel)],
    );
    let initial = RunContext::new().with("r", json!({"httpResponse": {"data": {"id": "abc"}}}));
    run(&harness, &wf, initial).await.unwrap();

    let requests = harness.client.requests();
    assert_eq!(requests[0].messages.last().unwrap().text(), "summarise: abc");
}

#[tokio::test]
async fn test_invalid_variable_name_is_config_error() {
    let harness = agent_harness(vec![]);
    let wf = agent_workflow(
        json!({"variableName": "not valid!", "userPrompt": "hi"}),
        vec![(chat_model_node(), Port::ChatModel)],
    );
    let err = run(&harness, &wf, RunContext::new()).await.unwrap_err();
    assert!(matches!(err, WeftError::InvalidVariableName(_)));
}
