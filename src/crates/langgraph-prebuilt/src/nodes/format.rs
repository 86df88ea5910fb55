//! Transforms `modelResponse` into `formattedResponse` per `outputFormat`.

use async_trait::async_trait;
use langgraph_core::error::{GraphError, Result};
use langgraph_core::execution_state::fields;
use langgraph_core::node::{NodeContext, NodeRunner};
use serde_json::{json, Value};

pub const NODE_TYPE: &str = "Format";

#[derive(Default)]
pub struct FormatNode;

impl FormatNode {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NodeRunner for FormatNode {
    async fn run(&self, ctx: &NodeContext, state: &Value, config: &Value) -> Result<Value> {
        let model_response = state.get(fields::MODEL_RESPONSE).and_then(Value::as_str).unwrap_or("");
        let output_format = config.get("outputFormat").and_then(Value::as_str).unwrap_or("text");

        let formatted = match output_format {
            "json" => {
                let parsed: Value = serde_json::from_str(model_response)
                    .map_err(|e| GraphError::node_execution(&ctx.node_id, format!("FORMAT_FAILED: {e}")))?;
                serde_json::to_string(&parsed)
                    .map_err(|e| GraphError::node_execution(&ctx.node_id, format!("FORMAT_FAILED: {e}")))?
            }
            _ => model_response.to_string(),
        };

        Ok(json!({ fields::FORMATTED_RESPONSE: formatted }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> NodeContext {
        NodeContext { conversation_id: "c".to_string(), invocation_id: "i".to_string(), node_id: "format".to_string() }
    }

    #[tokio::test]
    async fn text_format_passes_response_through() {
        let node = FormatNode::new();
        let delta = node
            .run(&ctx(), &json!({"modelResponse": "hello"}), &json!({"outputFormat": "text"}))
            .await
            .unwrap();
        assert_eq!(delta[fields::FORMATTED_RESPONSE], json!("hello"));
    }

    #[tokio::test]
    async fn json_format_reparses_and_reemits_canonical_json() {
        let node = FormatNode::new();
        let delta = node
            .run(&ctx(), &json!({"modelResponse": "{\"b\": 2, \"a\": 1}"}), &json!({"outputFormat": "json"}))
            .await
            .unwrap();
        let formatted = delta[fields::FORMATTED_RESPONSE].as_str().unwrap();
        let reparsed: Value = serde_json::from_str(formatted).unwrap();
        assert_eq!(reparsed["a"], json!(1));
        assert_eq!(reparsed["b"], json!(2));
    }

    #[tokio::test]
    async fn json_format_failure_surfaces_format_failed() {
        let node = FormatNode::new();
        let err = node
            .run(&ctx(), &json!({"modelResponse": "not json"}), &json!({"outputFormat": "json"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("FORMAT_FAILED"));
    }
}
