//! The declarative workflow data model: `{ id, name, entryPoint, nodes[], edges[] }`.
//!
//! This is deliberately simpler than [`crate::graph::Graph`]: edges are always
//! unconditional, and branching is the exclusive responsibility of `Router`
//! nodes (see the node library). A [`WorkflowDefinition`] is loaded verbatim
//! from a data store as JSON and validated once per invocation by the
//! [`crate::executor`].

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

pub const ROUTER_NODE_TYPE: &str = "Router";
pub const STREAM_TO_CLIENT_NODE_TYPE: &str = "StreamToClient";

/// A single node: `{ id, type, config }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub config: Value,
}

/// An unconditional edge: `{ id, from, to }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEdge {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// A workflow definition: `{ id, name, entryPoint, nodes[], edges[] }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    pub name: String,
    pub entry_point: String,
    pub nodes: Vec<WorkflowNode>,
    pub edges: Vec<WorkflowEdge>,
}

impl WorkflowDefinition {
    pub fn node(&self, id: &str) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// The unique outgoing edge from `node_id`, if any. Validation guarantees
    /// there is at most one.
    pub fn outgoing_edge(&self, node_id: &str) -> Option<&WorkflowEdge> {
        self.edges.iter().find(|e| e.from == node_id)
    }

    fn router_targets(node: &WorkflowNode) -> Vec<String> {
        if node.node_type != ROUTER_NODE_TYPE {
            return Vec::new();
        }
        node.config
            .get("routes")
            .and_then(Value::as_array)
            .map(|routes| {
                routes
                    .iter()
                    .filter_map(|r| r.get("target").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn router_default_route(node: &WorkflowNode) -> Option<String> {
        node.config
            .get("defaultRoute")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Whether `node_id` is terminal: a `StreamToClient` node, or a node with
    /// no outgoing edge and (if it's a Router) no configured targets either.
    pub fn is_terminal(&self, node_id: &str) -> bool {
        match self.node(node_id) {
            Some(node) if node.node_type == STREAM_TO_CLIENT_NODE_TYPE => true,
            Some(node) => {
                self.outgoing_edge(node_id).is_none() && Self::router_targets(node).is_empty()
            }
            None => true,
        }
    }

    /// Validate graph shape once per invocation, per the Graph Executor's
    /// validation pass.
    pub fn validate(&self) -> Result<()> {
        if self.node(&self.entry_point).is_none() {
            return Err(GraphError::Validation(format!(
                "entryPoint '{}' does not name a known node",
                self.entry_point
            )));
        }

        let mut seen_ids = HashSet::new();
        for node in &self.nodes {
            if !seen_ids.insert(node.id.as_str()) {
                return Err(GraphError::Validation(format!(
                    "duplicate node id '{}'",
                    node.id
                )));
            }
        }

        let known_ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();

        let mut outgoing_count: HashMap<&str, usize> = HashMap::new();
        for edge in &self.edges {
            if !known_ids.contains(edge.from.as_str()) {
                return Err(GraphError::Validation(format!(
                    "edge '{}' has unknown source node '{}'",
                    edge.id, edge.from
                )));
            }
            if !known_ids.contains(edge.to.as_str()) {
                return Err(GraphError::Validation(format!(
                    "edge '{}' has unknown target node '{}'",
                    edge.id, edge.to
                )));
            }
            *outgoing_count.entry(edge.from.as_str()).or_insert(0) += 1;
        }

        for (from, count) in &outgoing_count {
            if *count > 1 {
                return Err(GraphError::Validation(format!(
                    "node '{}' has {} unconditional outgoing edges; at most one is allowed",
                    from, count
                )));
            }
        }

        for node in &self.nodes {
            for target in Self::router_targets(node) {
                if !known_ids.contains(target.as_str()) {
                    return Err(GraphError::Validation(format!(
                        "router node '{}' targets unknown node '{}'",
                        node.id, target
                    )));
                }
            }
            if node.node_type == ROUTER_NODE_TYPE {
                if let Some(default_route) = Self::router_default_route(node) {
                    if !known_ids.contains(default_route.as_str()) {
                        return Err(GraphError::Validation(format!(
                            "router node '{}' defaultRoute targets unknown node '{}'",
                            node.id, default_route
                        )));
                    }
                }
            }
        }

        if !self.nodes.iter().any(|n| self.is_terminal(&n.id)) {
            return Err(GraphError::Validation(
                "workflow has no terminal node (StreamToClient or a node with no successors)"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, node_type: &str) -> WorkflowNode {
        WorkflowNode {
            id: id.to_string(),
            node_type: node_type.to_string(),
            config: json!({}),
        }
    }

    fn edge(id: &str, from: &str, to: &str) -> WorkflowEdge {
        WorkflowEdge {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    #[test]
    fn validates_a_simple_linear_workflow() {
        let wf = WorkflowDefinition {
            id: "wf-1".to_string(),
            name: "test".to_string(),
            entry_point: "a".to_string(),
            nodes: vec![node("a", "Memory"), node("b", "StreamToClient")],
            edges: vec![edge("e1", "a", "b")],
        };
        wf.validate().unwrap();
    }

    #[test]
    fn rejects_unknown_entry_point() {
        let wf = WorkflowDefinition {
            id: "wf-1".to_string(),
            name: "test".to_string(),
            entry_point: "missing".to_string(),
            nodes: vec![node("a", "Memory")],
            edges: vec![],
        };
        assert!(wf.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let wf = WorkflowDefinition {
            id: "wf-1".to_string(),
            name: "test".to_string(),
            entry_point: "a".to_string(),
            nodes: vec![node("a", "Memory"), node("a", "Format")],
            edges: vec![],
        };
        assert!(wf.validate().is_err());
    }

    #[test]
    fn rejects_multiple_unconditional_edges_from_one_node() {
        let wf = WorkflowDefinition {
            id: "wf-1".to_string(),
            name: "test".to_string(),
            entry_point: "a".to_string(),
            nodes: vec![
                node("a", "Memory"),
                node("b", "StreamToClient"),
                node("c", "StreamToClient"),
            ],
            edges: vec![edge("e1", "a", "b"), edge("e2", "a", "c")],
        };
        assert!(wf.validate().is_err());
    }

    #[test]
    fn rejects_router_target_to_unknown_node() {
        let mut router = node("r", ROUTER_NODE_TYPE);
        router.config = json!({ "routes": [{"condition": "true", "target": "missing"}] });
        let wf = WorkflowDefinition {
            id: "wf-1".to_string(),
            name: "test".to_string(),
            entry_point: "r".to_string(),
            nodes: vec![router],
            edges: vec![],
        };
        assert!(wf.validate().is_err());
    }

    #[test]
    fn requires_at_least_one_terminal_node() {
        let wf = WorkflowDefinition {
            id: "wf-1".to_string(),
            name: "test".to_string(),
            entry_point: "a".to_string(),
            nodes: vec![node("a", "Memory"), node("b", "Format")],
            edges: vec![edge("e1", "a", "b"), edge("e2", "b", "a")],
        };
        assert!(wf.validate().is_err());
    }
}
