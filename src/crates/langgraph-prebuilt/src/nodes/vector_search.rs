//! Queries a [`VectorIndex`] restricted to `allowedDocumentIds` and writes
//! the retrieved text under the key the Prompt Engine reads.

use crate::stores::VectorIndex;
use async_trait::async_trait;
use langgraph_core::error::Result;
use langgraph_core::execution_state::fields;
use langgraph_core::node::{NodeContext, NodeRunner};
use serde_json::{json, Value};
use std::sync::Arc;

pub const NODE_TYPE: &str = "VectorSearch";

pub struct VectorSearchNode {
    index: Arc<dyn VectorIndex>,
}

impl VectorSearchNode {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }
}

fn interpolate(template: &str, state: &Value) -> String {
    let user_prompt = state.get(fields::USER_PROMPT).and_then(Value::as_str).unwrap_or("");
    template.replace("{{userPrompt}}", user_prompt)
}

#[async_trait]
impl NodeRunner for VectorSearchNode {
    async fn run(&self, _ctx: &NodeContext, state: &Value, config: &Value) -> Result<Value> {
        let result_count = config.get("resultCount").and_then(Value::as_u64).unwrap_or(5) as usize;
        let search_query = match config.get("searchQuery").and_then(Value::as_str) {
            Some(template) => interpolate(template, state),
            None => state.get(fields::USER_PROMPT).and_then(Value::as_str).unwrap_or("").to_string(),
        };

        let allowed_document_ids: Vec<String> = state
            .get(fields::ALLOWED_DOCUMENT_IDS)
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let documents = self.index.query(&search_query, &allowed_document_ids, result_count).await;
        let combined_text: String = documents.iter().map(|d| d.text.clone()).collect::<Vec<_>>().join("\n\n");

        Ok(json!({
            fields::CONTEXT_META: { "count": documents.len(), "combinedTextLength": combined_text.len() },
            fields::RETRIEVED_CONTEXT: combined_text,
        }))
    }
}
