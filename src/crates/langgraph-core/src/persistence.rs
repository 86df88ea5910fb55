//! Bridges the execution state store to [`langgraph_checkpoint`] for the
//! Snapshot abstraction: "an opaque blob suitable for persistence; used for
//! resumption".
//!
//! A conversation's `conversationId` is reused directly as the checkpoint
//! system's `thread_id` — the two concepts coincide in this system, since
//! there is exactly one live state record per conversation.

use crate::error::{GraphError, Result};
use langgraph_checkpoint::{
    Checkpoint, CheckpointConfig, CheckpointMetadata, CheckpointSaver, CheckpointSource,
};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// The channel name under which execution state is stored in a [`Checkpoint`].
pub const STATE_CHANNEL: &str = "state";

fn config_for(conversation_id: &str) -> CheckpointConfig {
    CheckpointConfig::new().with_thread_id(conversation_id.to_string())
}

/// Persist `state` as the latest checkpoint for `conversation_id`.
pub async fn save_state(
    saver: &Arc<dyn CheckpointSaver>,
    conversation_id: &str,
    state: &Value,
    step: i32,
) -> Result<()> {
    let mut channel_values = HashMap::new();
    channel_values.insert(STATE_CHANNEL.to_string(), state.clone());

    let checkpoint = Checkpoint::new(
        Uuid::new_v4().to_string(),
        channel_values,
        HashMap::new(),
        HashMap::new(),
    );
    let metadata = CheckpointMetadata::new()
        .with_source(CheckpointSource::Loop)
        .with_step(step);

    saver
        .put(&config_for(conversation_id), checkpoint, metadata, HashMap::new())
        .await
        .map_err(GraphError::Checkpoint)?;
    Ok(())
}

/// Load the latest persisted state for `conversation_id`, if any.
pub async fn load_state(
    saver: &Arc<dyn CheckpointSaver>,
    conversation_id: &str,
) -> Result<Option<Value>> {
    let checkpoint = saver
        .get(&config_for(conversation_id))
        .await
        .map_err(GraphError::Checkpoint)?;
    Ok(checkpoint.and_then(|c| c.channel_values.get(STATE_CHANNEL).cloned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use langgraph_checkpoint::InMemoryCheckpointSaver;
    use serde_json::json;

    #[tokio::test]
    async fn round_trips_through_in_memory_saver() {
        let saver: Arc<dyn CheckpointSaver> = Arc::new(InMemoryCheckpointSaver::new());
        let state = json!({"userId": "u1", "memory": []});

        assert!(load_state(&saver, "conv-1").await.unwrap().is_none());

        save_state(&saver, "conv-1", &state, 0).await.unwrap();
        let loaded = load_state(&saver, "conv-1").await.unwrap();
        assert_eq!(loaded, Some(state));
    }
}
