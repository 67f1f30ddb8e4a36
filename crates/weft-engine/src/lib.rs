//! Workflow graph execution engine.
//!
//! A workflow is a directed graph of typed nodes connected by labeled
//! edges. The planner selects the sub-graph reachable from trigger nodes
//! over main-flow edges and orders it topologically; the run driver walks
//! the plan strictly sequentially, threading a shared value context through
//! the executors and publishing per-node lifecycle status. The agent
//! executor turns an agent node's star of sub-nodes (chat model, memory,
//! tools) into a bounded tool-calling loop.

pub mod agent;
pub mod driver;
pub mod engine;
pub mod event;
pub mod executor;
pub mod executors;
pub mod planner;
pub mod registry;
pub mod template;

pub use agent::AgentExecutor;
pub use driver::RunDriver;
pub use engine::Engine;
pub use event::{ExecuteWorkflow, EXECUTE_WORKFLOW_EVENT};
pub use executor::{ClientFactory, ExecutorContext, LiveClientFactory, NodeExecutor, Services};
pub use planner::plan;
pub use registry::ExecutorRegistry;
pub use template::render;
