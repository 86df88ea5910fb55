//! The execution state store: a typed record of per-invocation fields merged
//! through declarative reducers (see [`crate::state`]).
//!
//! This module implements the three operations a workflow invocation needs
//! around state: seed a fresh record for a new invocation, merge a node's
//! delta into the current record, and snapshot the record for persistence
//! and resumption. The executor itself never mutates state in place — every
//! [`merge`] call returns a new, independent value.

use crate::error::{GraphError, Result};
use crate::state::StateSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// What the transport hands the executor to start or continue an invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    pub workflow_id: String,
    pub user_id: String,
    pub conversation_id: String,
    pub user_prompt: String,
    #[serde(default)]
    pub allowed_document_ids: Vec<String>,
}

/// Canonical execution-state field names (see the state field glossary).
pub mod fields {
    pub const USER_ID: &str = "userId";
    pub const WORKFLOW_ID: &str = "workflowId";
    pub const CONVERSATION_ID: &str = "conversationId";
    pub const USER_PROMPT: &str = "userPrompt";
    pub const MEMORY: &str = "memory";
    pub const SLOT_VALUES: &str = "slotValues";
    pub const SLOT_ATTEMPTS: &str = "slotAttempts";
    pub const CURRENT_SLOT_KEY: &str = "currentSlotKey";
    pub const ALL_SLOTS_FILLED: &str = "allSlotsFilled";
    pub const INTENT: &str = "intent";
    pub const INTENT_CONFIDENCE: &str = "intentConfidence";
    pub const NEXT_NODE: &str = "nextNode";
    pub const ROUTING_REASON: &str = "routingReason";
    pub const MODEL_RESPONSE: &str = "modelResponse";
    pub const FORMATTED_RESPONSE: &str = "formattedResponse";
    pub const CURRENT_NODE_ID: &str = "currentNodeId";
    pub const CURRENT_NODE_TYPE: &str = "currentNodeType";
    pub const CURRENT_NODE_CONFIG: &str = "currentNodeConfig";
    pub const ALLOWED_DOCUMENT_IDS: &str = "allowedDocumentIds";
    pub const OWNERS_FOR_PROGRESS: &str = "ownersForProgress";
    pub const CONTEXT_META: &str = "contextMeta";
    /// Retrieved-context text written by `VectorSearch`, consumed by the Prompt Engine.
    pub const RETRIEVED_CONTEXT: &str = "retrievedContext";
    pub const INPUT: &str = "input";
    pub const ROUTE_CHOSEN: &str = "__routeChosen";
    pub const NEEDS_USER_INPUT: &str = "__needsUserInput";
    pub const AWAITING_INPUT_FOR: &str = "awaitingInputFor";
    pub const INPUT_CURSOR: &str = "inputCursor";
}

/// Build the [`StateSchema`] that governs merges of the canonical execution-state fields.
///
/// Every node-visible field named in the glossary is declared here with its reducer
/// pattern; anything else is rejected by [`merge`] as an unknown field.
pub fn canonical_schema() -> StateSchema {
    use crate::state::{AppendReducer, MergeReducer, OverwriteReducer, StickyNumericReducer};

    let mut schema = StateSchema::new();
    schema.add_field(fields::MEMORY, Box::new(AppendReducer));
    schema.add_field(fields::SLOT_VALUES, Box::new(MergeReducer));
    schema.add_field(fields::SLOT_ATTEMPTS, Box::new(MergeReducer));
    schema.add_field(fields::INPUT_CURSOR, Box::new(StickyNumericReducer));

    for field in [
        fields::USER_ID,
        fields::WORKFLOW_ID,
        fields::CONVERSATION_ID,
        fields::USER_PROMPT,
        fields::CURRENT_SLOT_KEY,
        fields::ALL_SLOTS_FILLED,
        fields::INTENT,
        fields::INTENT_CONFIDENCE,
        fields::NEXT_NODE,
        fields::ROUTING_REASON,
        fields::MODEL_RESPONSE,
        fields::FORMATTED_RESPONSE,
        fields::CURRENT_NODE_ID,
        fields::CURRENT_NODE_TYPE,
        fields::CURRENT_NODE_CONFIG,
        fields::ALLOWED_DOCUMENT_IDS,
        fields::OWNERS_FOR_PROGRESS,
        fields::CONTEXT_META,
        fields::RETRIEVED_CONTEXT,
        fields::INPUT,
        fields::ROUTE_CHOSEN,
        fields::NEEDS_USER_INPUT,
        fields::AWAITING_INPUT_FOR,
    ] {
        schema.add_field(field, Box::new(OverwriteReducer));
    }

    schema
}

/// Seed a fresh execution state for a new invocation.
///
/// Identity/workflow/user-prompt fields come from the request; collection
/// fields (`memory`, `slotValues`, `slotAttempts`) start empty.
pub fn fresh(request: &InvocationRequest) -> Value {
    json!({
        fields::USER_ID: request.user_id,
        fields::WORKFLOW_ID: request.workflow_id,
        fields::CONVERSATION_ID: request.conversation_id,
        fields::USER_PROMPT: request.user_prompt,
        fields::ALLOWED_DOCUMENT_IDS: request.allowed_document_ids,
        fields::MEMORY: [],
        fields::SLOT_VALUES: {},
        fields::SLOT_ATTEMPTS: {},
        fields::ALL_SLOTS_FILLED: false,
        fields::NEEDS_USER_INPUT: false,
    })
}

/// Merge a node's delta into state via per-field reducers, returning a new state.
///
/// Pure: `state` is never mutated. Unknown keys in `delta` are rejected.
pub fn merge(schema: &StateSchema, state: &Value, delta: &Value) -> Result<Value> {
    let mut next = state.clone();
    schema
        .apply_strict(&mut next, delta)
        .map_err(|e| GraphError::State(e.to_string()))?;
    Ok(next)
}

/// Produce an opaque, persistable snapshot of `state`.
///
/// Uses the tooling crate's stable (key-sorted) JSON encoding so that two
/// semantically-identical states serialize to byte-identical snapshots.
pub fn snapshot(state: &Value) -> Result<String> {
    tooling::serialization::stable_json_string(state)
        .map_err(|e| GraphError::Execution(format!("snapshot failed: {e}")))
}

/// Load a state previously produced by [`snapshot`].
pub fn load_snapshot(blob: &str) -> Result<Value> {
    serde_json::from_str(blob).map_err(GraphError::Serialization)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> InvocationRequest {
        InvocationRequest {
            workflow_id: "wf-1".to_string(),
            user_id: "user-1".to_string(),
            conversation_id: "conv-1".to_string(),
            user_prompt: "hello".to_string(),
            allowed_document_ids: vec!["doc-1".to_string()],
        }
    }

    #[test]
    fn fresh_seeds_identity_and_empty_collections() {
        let state = fresh(&request());
        assert_eq!(state[fields::WORKFLOW_ID], json!("wf-1"));
        assert_eq!(state[fields::USER_PROMPT], json!("hello"));
        assert_eq!(state[fields::MEMORY], json!([]));
        assert_eq!(state[fields::ALL_SLOTS_FILLED], json!(false));
    }

    #[test]
    fn merge_is_pure_and_appends_memory() {
        let schema = canonical_schema();
        let state = fresh(&request());

        let delta = json!({ fields::MEMORY: [{"role": "user", "content": "hi"}] });
        let next = merge(&schema, &state, &delta).unwrap();

        assert_eq!(state[fields::MEMORY], json!([]));
        assert_eq!(
            next[fields::MEMORY],
            json!([{"role": "user", "content": "hi"}])
        );
    }

    #[test]
    fn merge_rejects_unknown_field() {
        let schema = canonical_schema();
        let state = fresh(&request());

        let delta = json!({ "notARealField": 1 });
        let err = merge(&schema, &state, &delta).unwrap_err();
        assert!(matches!(err, GraphError::State(_)));
    }

    #[test]
    fn merge_associativity_for_replace_fields() {
        let schema = canonical_schema();
        let state = fresh(&request());

        let d1 = json!({ fields::INTENT: "greeting" });
        let d2 = json!({ fields::INTENT_CONFIDENCE: 0.9 });

        let step_by_step = merge(&schema, &merge(&schema, &state, &d1).unwrap(), &d2).unwrap();

        let combined = json!({ fields::INTENT: "greeting", fields::INTENT_CONFIDENCE: 0.9 });
        let one_shot = merge(&schema, &state, &combined).unwrap();

        assert_eq!(step_by_step, one_shot);
    }

    #[test]
    fn snapshot_round_trips() {
        let schema = canonical_schema();
        let mut state = fresh(&request());
        state = merge(&schema, &state, &json!({ fields::INTENT: "refund" })).unwrap();

        let blob = snapshot(&state).unwrap();
        let restored = load_snapshot(&blob).unwrap();

        assert_eq!(restored, state);
        // merge(state, {}) is a no-op, matching the round-trip invariant.
        let unchanged = merge(&schema, &restored, &json!({})).unwrap();
        assert_eq!(unchanged, state);
    }

    #[test]
    fn sticky_cursor_ignores_non_numeric_delta() {
        let schema = canonical_schema();
        let mut state = fresh(&request());
        state = merge(&schema, &state, &json!({ fields::INPUT_CURSOR: 1 })).unwrap();

        let unchanged = merge(&schema, &state, &json!({ fields::INPUT_CURSOR: null })).unwrap();
        assert_eq!(unchanged[fields::INPUT_CURSOR], json!(1));

        let advanced = merge(&schema, &state, &json!({ fields::INPUT_CURSOR: 2 })).unwrap();
        assert_eq!(advanced[fields::INPUT_CURSOR], json!(2));
    }
}
