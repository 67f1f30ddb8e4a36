use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use weft_core::error::{Result, WeftError};
use weft_core::types::{Node, Workflow};

/// Turn a stored graph into the ordered list of nodes to execute.
///
/// Only main-flow edges participate; sub-node edges are the executors'
/// business. The plan is the topologically sorted sub-graph reachable from
/// trigger nodes, with node id as the secondary sort key so the same input
/// always yields the same order. A workflow without triggers plans to an
/// empty list; a cycle in the reachable main-flow sub-graph is an error
/// before any node runs.
pub fn plan(workflow: &Workflow) -> Result<Vec<&Node>> {
    let nodes: BTreeMap<&str, &Node> = workflow
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n))
        .collect();

    // Main edges only; both endpoints must exist.
    let mut successors: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for conn in workflow.connections.iter().filter(|c| c.to_input.is_main()) {
        for endpoint in [conn.from_node_id.as_str(), conn.to_node_id.as_str()] {
            if !nodes.contains_key(endpoint) {
                return Err(WeftError::InvalidConfig {
                    kind: "CONNECTION".into(),
                    message: format!(
                        "connection '{}' references unknown node '{}'",
                        conn.id, endpoint
                    ),
                });
            }
        }
        successors
            .entry(conn.from_node_id.as_str())
            .or_default()
            .push(conn.to_node_id.as_str());
    }

    // Breadth-first reachability from the triggers.
    let mut reachable: BTreeSet<&str> = BTreeSet::new();
    let mut queue: VecDeque<&str> = workflow
        .nodes
        .iter()
        .filter(|n| n.kind.is_trigger())
        .map(|n| n.id.as_str())
        .collect();
    for id in &queue {
        reachable.insert(id);
    }
    while let Some(current) = queue.pop_front() {
        for next in successors.get(current).into_iter().flatten() {
            if reachable.insert(next) {
                queue.push_back(next);
            }
        }
    }

    if reachable.is_empty() {
        debug!(workflow_id = %workflow.id, "no trigger nodes, empty plan");
        return Ok(vec![]);
    }

    // Kahn over the induced sub-graph; ready set ordered by node id.
    let mut in_degree: BTreeMap<&str, usize> = reachable.iter().map(|id| (*id, 0)).collect();
    for (from, targets) in &successors {
        if !reachable.contains(from) {
            continue;
        }
        for to in targets {
            if reachable.contains(to) {
                *in_degree.get_mut(to).expect("reachable node has a degree") += 1;
            }
        }
    }

    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut order: Vec<&Node> = Vec::with_capacity(reachable.len());

    while let Some(&id) = ready.iter().next() {
        ready.remove(id);
        order.push(nodes[id]);
        for next in successors.get(id).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(next);
                }
            }
        }
    }

    if order.len() != reachable.len() {
        // Anything still carrying in-degree sits on a cycle.
        let mut stuck = String::new();
        for (id, degree) in &in_degree {
            if *degree > 0 {
                stuck = id.to_string();
                break;
            }
        }
        return Err(WeftError::PlanCycle(stuck));
    }

    debug!(
        workflow_id = %workflow.id,
        plan_len = order.len(),
        "workflow planned"
    );
    Ok(order)
}
