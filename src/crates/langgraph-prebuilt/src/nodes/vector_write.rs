//! Persists designated state fields as embeddings. No effect on control flow.

use crate::stores::{VectorDocument, VectorIndex};
use async_trait::async_trait;
use langgraph_core::error::Result;
use langgraph_core::node::{NodeContext, NodeRunner};
use serde_json::{json, Value};
use std::sync::Arc;

pub const NODE_TYPE: &str = "VectorWrite";

pub struct VectorWriteNode {
    index: Arc<dyn VectorIndex>,
}

impl VectorWriteNode {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl NodeRunner for VectorWriteNode {
    async fn run(&self, ctx: &NodeContext, state: &Value, config: &Value) -> Result<Value> {
        let field_names: Vec<String> = config
            .get("fields")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        for field_name in field_names {
            if let Some(text) = state.get(&field_name).and_then(Value::as_str) {
                if text.is_empty() {
                    continue;
                }
                self.index
                    .write(VectorDocument {
                        document_id: format!("{}:{}", ctx.conversation_id, field_name),
                        text: text.to_string(),
                    })
                    .await;
            }
        }

        Ok(json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryVectorIndex;

    fn ctx() -> NodeContext {
        NodeContext { conversation_id: "c".to_string(), invocation_id: "i".to_string(), node_id: "write".to_string() }
    }

    #[tokio::test]
    async fn writes_designated_fields_as_documents() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let node = VectorWriteNode::new(index.clone());
        let state = json!({"modelResponse": "the answer is 42", "formattedResponse": "42"});
        node.run(&ctx(), &state, &json!({"fields": ["modelResponse"]})).await.unwrap();

        let found = index.query("42", &[], 10).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].document_id, "c:modelResponse");
    }

    #[tokio::test]
    async fn skips_missing_or_empty_fields() {
        let index = Arc::new(InMemoryVectorIndex::new());
        let node = VectorWriteNode::new(index.clone());
        node.run(&ctx(), &json!({}), &json!({"fields": ["missing"]})).await.unwrap();
        assert!(index.query("", &[], 10).await.is_empty());
    }
}
