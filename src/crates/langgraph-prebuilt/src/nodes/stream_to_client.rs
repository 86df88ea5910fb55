//! Terminal node: emits the final `COMPLETED` progress event carrying
//! `formattedResponse`. Returns an empty delta; the executor treats this
//! node's outgoing edge set (or lack thereof) as end-of-path.

use async_trait::async_trait;
use langgraph_core::error::Result;
use langgraph_core::execution_state::fields;
use langgraph_core::node::{NodeContext, NodeRunner};
use langgraph_core::progress::{ProgressEventKind, ProgressSink};
use langgraph_core::workflow::STREAM_TO_CLIENT_NODE_TYPE;
use serde_json::{json, Value};
use std::sync::Arc;

pub const NODE_TYPE: &str = STREAM_TO_CLIENT_NODE_TYPE;

pub struct StreamToClientNode {
    progress: Arc<dyn ProgressSink>,
}

impl StreamToClientNode {
    pub fn new(progress: Arc<dyn ProgressSink>) -> Self {
        Self { progress }
    }
}

#[async_trait]
impl NodeRunner for StreamToClientNode {
    async fn run(&self, ctx: &NodeContext, state: &Value, _config: &Value) -> Result<Value> {
        let formatted_response = state.get(fields::FORMATTED_RESPONSE).cloned().unwrap_or(Value::Null);
        self.progress
            .emit(
                &ctx.conversation_id,
                &ctx.invocation_id,
                &ctx.node_id,
                ProgressEventKind::Completed,
                Some(json!({ fields::FORMATTED_RESPONSE: formatted_response })),
            )
            .await
            .ok();
        Ok(json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use langgraph_core::progress::InMemoryProgressSink;

    fn ctx() -> NodeContext {
        NodeContext { conversation_id: "c".to_string(), invocation_id: "i".to_string(), node_id: "stream".to_string() }
    }

    #[tokio::test]
    async fn emits_completed_event_carrying_formatted_response() {
        let progress = Arc::new(InMemoryProgressSink::new());
        let node = StreamToClientNode::new(progress.clone());
        let delta = node.run(&ctx(), &json!({"formattedResponse": "final answer"}), &json!({})).await.unwrap();
        assert_eq!(delta, json!({}));

        let events = progress.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ProgressEventKind::Completed);
        assert_eq!(events[0].payload.as_ref().unwrap()[fields::FORMATTED_RESPONSE], json!("final answer"));
    }
}
