//! Fills a sequence of declared slots from free-form user input, suspending
//! the step loop via `__needsUserInput` when a required slot is still
//! missing and the caller has retries remaining.

use async_trait::async_trait;
use langgraph_core::error::Result;
use langgraph_core::execution_state::fields;
use langgraph_core::node::{NodeContext, NodeRunner};
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Map, Value};

pub const NODE_TYPE: &str = "SlotTracker";

#[derive(Debug, Clone, Deserialize)]
struct SlotSpec {
    key: String,
    prompt: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    validation: Option<String>,
    #[serde(rename = "maxRetries", default = "default_max_retries")]
    max_retries: u64,
}

fn default_max_retries() -> u64 {
    3
}

/// A candidate answer for `slot`, or `None` if nothing usable was found in
/// `user_prompt`. When `validation` is a regex, the slot only accepts a
/// substring match against it regardless of turn. Otherwise a free-form
/// slot only accepts the current turn when it's the one being asked about
/// (`currentSlotKey`) -- an unprompted utterance can't be attributed to a
/// specific unanswered slot.
fn extract_candidate(user_prompt: &str, validation: &Option<String>, is_answering_this_slot: bool) -> Option<String> {
    if let Some(pattern) = validation {
        let re = Regex::new(pattern).ok()?;
        return re.find(user_prompt).map(|m| m.as_str().to_string());
    }
    if is_answering_this_slot && !user_prompt.is_empty() {
        Some(user_prompt.to_string())
    } else {
        None
    }
}

#[derive(Default)]
pub struct SlotTrackerNode;

impl SlotTrackerNode {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NodeRunner for SlotTrackerNode {
    async fn run(&self, _ctx: &NodeContext, state: &Value, config: &Value) -> Result<Value> {
        let slots: Vec<SlotSpec> = config
            .get("slots")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        let max_total_attempts = config.get("maxTotalAttempts").and_then(Value::as_u64);
        let fallback_route = config.get("fallbackRoute").and_then(Value::as_str).map(str::to_string);

        let slot_values = state.get(fields::SLOT_VALUES).and_then(Value::as_object).cloned().unwrap_or_default();
        let slot_attempts = state.get(fields::SLOT_ATTEMPTS).and_then(Value::as_object).cloned().unwrap_or_default();
        let current_slot_key = state.get(fields::CURRENT_SLOT_KEY).and_then(Value::as_str).map(str::to_string);
        let user_prompt = state.get(fields::USER_PROMPT).and_then(Value::as_str).unwrap_or("").trim().to_string();

        let mut new_slot_values = Map::new();
        let mut new_slot_attempts = Map::new();
        let mut running_total: u64 = slot_attempts.values().filter_map(Value::as_u64).sum();

        for slot in &slots {
            if slot_values.contains_key(&slot.key) {
                continue;
            }

            let is_answering_this_slot = current_slot_key.as_deref() == Some(slot.key.as_str());
            if let Some(value) = extract_candidate(&user_prompt, &slot.validation, is_answering_this_slot) {
                new_slot_values.insert(slot.key.clone(), json!(value));
                continue;
            }

            let attempts = slot_attempts.get(&slot.key).and_then(Value::as_u64).unwrap_or(0) + 1;
            new_slot_attempts.insert(slot.key.clone(), json!(attempts));
            running_total += 1;

            if let (Some(cap), Some(route)) = (max_total_attempts, &fallback_route) {
                if running_total > cap {
                    return Ok(json!({
                        fields::SLOT_ATTEMPTS: new_slot_attempts,
                        fields::ROUTE_CHOSEN: route,
                        fields::ROUTING_REASON: "slot filling exceeded maxTotalAttempts",
                        fields::NEEDS_USER_INPUT: false,
                    }));
                }
            }

            if slot.required && attempts < slot.max_retries {
                return Ok(json!({
                    fields::SLOT_ATTEMPTS: new_slot_attempts,
                    fields::CURRENT_SLOT_KEY: slot.key,
                    fields::NEEDS_USER_INPUT: true,
                    fields::AWAITING_INPUT_FOR: { "slotKey": slot.key, "prompt": slot.prompt },
                }));
            }
        }

        let all_filled = slots
            .iter()
            .filter(|s| s.required)
            .all(|s| slot_values.contains_key(&s.key) || new_slot_values.contains_key(&s.key));

        Ok(json!({
            fields::SLOT_VALUES: new_slot_values,
            fields::SLOT_ATTEMPTS: new_slot_attempts,
            fields::ALL_SLOTS_FILLED: all_filled,
            fields::NEEDS_USER_INPUT: false,
        }))
    }
}
