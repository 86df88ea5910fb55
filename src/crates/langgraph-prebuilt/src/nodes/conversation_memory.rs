//! Loads prior turns from a [`ConversationStore`] at the start of an
//! invocation and persists new ones at the end, via the executor's commit hook.

use crate::stores::{ConversationStore, MemoryTurn};
use async_trait::async_trait;
use langgraph_core::error::Result;
use langgraph_core::execution_state::fields;
use langgraph_core::node::{NodeContext, NodeRunner};
use serde_json::{json, Value};
use std::sync::Arc;

pub const NODE_TYPE: &str = "ConversationMemory";

pub struct ConversationMemoryNode {
    store: Arc<dyn ConversationStore>,
}

impl ConversationMemoryNode {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl NodeRunner for ConversationMemoryNode {
    async fn run(&self, ctx: &NodeContext, state: &Value, config: &Value) -> Result<Value> {
        let already_primed = state
            .get(fields::MEMORY)
            .and_then(Value::as_array)
            .map(|a| !a.is_empty())
            .unwrap_or(false);
        if already_primed {
            return Ok(json!({}));
        }

        let memory_size = config.get("memorySize").and_then(Value::as_u64).unwrap_or(20) as usize;
        let turns = self.store.load(&ctx.conversation_id, memory_size).await;
        Ok(json!({ fields::MEMORY: turns }))
    }

    async fn commit(&self, ctx: &NodeContext, state: &Value) -> Result<()> {
        let mut turns = Vec::new();
        if let Some(user_prompt) = state.get(fields::USER_PROMPT).and_then(Value::as_str) {
            if !user_prompt.is_empty() {
                turns.push(MemoryTurn { role: "user".to_string(), content: user_prompt.to_string() });
            }
        }
        if let Some(model_response) = state.get(fields::MODEL_RESPONSE).and_then(Value::as_str) {
            if !model_response.is_empty() {
                turns.push(MemoryTurn { role: "assistant".to_string(), content: model_response.to_string() });
            }
        }
        if !turns.is_empty() {
            self.store.append(&ctx.conversation_id, turns).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryConversationStore;
    use serde_json::json;

    fn ctx() -> NodeContext {
        NodeContext {
            conversation_id: "c1".to_string(),
            invocation_id: "i1".to_string(),
            node_id: "memory".to_string(),
        }
    }

    #[tokio::test]
    async fn loads_prior_turns_when_state_memory_is_empty() {
        let store = Arc::new(InMemoryConversationStore::new());
        store
            .append("c1", vec![MemoryTurn { role: "user".to_string(), content: "hi".to_string() }])
            .await;

        let node = ConversationMemoryNode::new(store);
        let delta = node.run(&ctx(), &json!({"memory": []}), &json!({})).await.unwrap();
        assert_eq!(delta[fields::MEMORY][0]["content"], json!("hi"));
    }

    #[tokio::test]
    async fn does_not_reload_when_state_already_has_memory() {
        let store = Arc::new(InMemoryConversationStore::new());
        let node = ConversationMemoryNode::new(store);
        let delta = node
            .run(&ctx(), &json!({"memory": [{"role": "user", "content": "already here"}]}), &json!({}))
            .await
            .unwrap();
        assert_eq!(delta, json!({}));
    }

    #[tokio::test]
    async fn commit_persists_the_turn_pair_from_final_state() {
        let store = Arc::new(InMemoryConversationStore::new());
        let node = ConversationMemoryNode::new(store.clone());
        node.commit(&ctx(), &json!({"userPrompt": "hello", "modelResponse": "hi there"}))
            .await
            .unwrap();

        let loaded = store.load("c1", 10).await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].role, "user");
        assert_eq!(loaded[1].role, "assistant");
    }

    #[tokio::test]
    async fn commit_is_a_no_op_when_nothing_to_persist() {
        let store = Arc::new(InMemoryConversationStore::new());
        let node = ConversationMemoryNode::new(store.clone());
        node.commit(&ctx(), &json!({})).await.unwrap();
        assert!(store.load("c1", 10).await.is_empty());
    }
}
