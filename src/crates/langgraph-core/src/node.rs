//! The node library contract: `run(state, config, services) → delta`.
//!
//! Concrete node kinds (ConversationMemory, IntentClassifier, Router,
//! SlotTracker, VectorSearch, VectorWrite, ModelInvoke, Format,
//! StreamToClient) live in `langgraph-prebuilt`, which depends on this
//! crate. A node owns whatever services it needs (model dispatch, prompt
//! engine, progress sink, ...) via constructor injection rather than a
//! generic services bag, so the trait stays narrow.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Per-step context handed to a node at invocation time, distinct from the
/// services it was constructed with.
#[derive(Debug, Clone)]
pub struct NodeContext {
    pub conversation_id: String,
    pub invocation_id: String,
    pub node_id: String,
}

/// A node kind: stateless with respect to any single invocation, reused
/// across steps and conversations. Must not mutate `state`; returns only
/// the fields it wishes to update (a delta, merged via reducers).
#[async_trait]
pub trait NodeRunner: Send + Sync {
    async fn run(&self, ctx: &NodeContext, state: &Value, config: &Value) -> Result<Value>;

    /// Called once per visited node at the end of an invocation (on both
    /// completion and suspension), with the final state for that
    /// invocation. Default is a no-op; `ConversationMemory` overrides this
    /// to persist new turns to its data store.
    async fn commit(&self, _ctx: &NodeContext, _state: &Value) -> Result<()> {
        Ok(())
    }
}

/// Maps a workflow node's `type` string to the [`NodeRunner`] that implements it.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    runners: HashMap<String, Arc<dyn NodeRunner>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_type: impl Into<String>, runner: Arc<dyn NodeRunner>) {
        self.runners.insert(node_type.into(), runner);
    }

    pub fn get(&self, node_type: &str) -> Option<&Arc<dyn NodeRunner>> {
        self.runners.get(node_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoNode;

    #[async_trait]
    impl NodeRunner for EchoNode {
        async fn run(&self, _ctx: &NodeContext, _state: &Value, config: &Value) -> Result<Value> {
            Ok(config.clone())
        }
    }

    #[tokio::test]
    async fn registry_dispatches_by_node_type() {
        let mut registry = NodeRegistry::new();
        registry.register("Echo", Arc::new(EchoNode));

        let ctx = NodeContext {
            conversation_id: "c".to_string(),
            invocation_id: "i".to_string(),
            node_id: "n".to_string(),
        };
        let runner = registry.get("Echo").unwrap();
        let delta = runner.run(&ctx, &json!({}), &json!({"x": 1})).await.unwrap();
        assert_eq!(delta, json!({"x": 1}));

        assert!(registry.get("Missing").is_none());
    }
}
