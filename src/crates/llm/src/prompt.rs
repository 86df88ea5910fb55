//! Prompt Engine: assembles a `{messages[], metadata}` pair for a
//! `(state, modelCapability, stepPrompt, options)` tuple.
//!
//! Assembly order, normalization and truncation policy are data, not code —
//! see [`PromptEngine::build`] for the single place all three live.

use crate::registry::ModelCapability;
use langgraph_core::execution_state::fields;
use langgraph_core::{Message, MessageContent, MessageRole};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

/// Identifies the assembly policy version; bump whenever `build`'s semantics change.
pub const BASE_PROMPT_VERSION: &str = "prompt-engine-v1";

#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    /// Overrides `currentNodeConfig.memorySize` when set.
    pub memory_size_override: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptMetadata {
    pub total_tokens: u32,
    pub cost_estimate: f64,
    pub base_prompt_version: String,
    pub truncation_applied: bool,
    pub build_time_ms: u64,
}

#[derive(Debug, Clone)]
pub struct PromptOutcome {
    pub messages: Vec<Message>,
    pub metadata: PromptMetadata,
}

#[derive(Debug, thiserror::Error)]
#[error("prompt build failed: {0}")]
pub struct PromptBuildError(pub String);

#[derive(Debug, Clone, Default)]
pub struct PromptEngine;

impl PromptEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn build(
        &self,
        state: &Value,
        capability: &ModelCapability,
        step_prompt: &str,
        options: &PromptOptions,
    ) -> Result<PromptOutcome, PromptBuildError> {
        let started = Instant::now();
        let config = state
            .get(fields::CURRENT_NODE_CONFIG)
            .cloned()
            .unwrap_or(Value::Null);

        let mut system_prefix = Vec::new();

        if let Some(directive) = style_tone_directive(&config) {
            system_prefix.push(Message::system(directive));
        }

        let input_value = state.get(fields::INPUT).cloned().unwrap_or(Value::Null);
        system_prefix.push(Message::system(interpolate_step_prompt(
            step_prompt,
            &input_value,
        )?));

        if let Some(directive) = output_format_directive(&config) {
            system_prefix.push(Message::system(directive));
        }

        let mut retrieved_context_message = retrieved_context_message(state);

        let user_prompt = state
            .get(fields::USER_PROMPT)
            .and_then(Value::as_str)
            .unwrap_or("");

        let mut memory_messages = if use_memory(&config) {
            memory_turns(state, memory_size(&config, options))
        } else {
            Vec::new()
        };

        let mut user_message = if user_prompt.is_empty() {
            None
        } else {
            Some(Message::human(user_prompt))
        };

        normalize_user_first(&mut memory_messages, &mut user_message, user_prompt);

        let mut truncation_applied = false;
        truncate_to_budget(
            capability,
            &system_prefix,
            &mut retrieved_context_message,
            &mut memory_messages,
            &mut user_message,
            &mut truncation_applied,
        );

        let messages = assemble(
            &system_prefix,
            &retrieved_context_message,
            &memory_messages,
            &user_message,
        );

        let total_chars: usize = messages.iter().map(message_text_len).sum();
        let total_tokens = capability.tokenizer.estimate(total_chars, messages.len());
        let cost_estimate = capability
            .pricing
            .estimate_cost_usd(total_tokens, capability.reserved_output_tokens);

        Ok(PromptOutcome {
            messages,
            metadata: PromptMetadata {
                total_tokens,
                cost_estimate,
                base_prompt_version: BASE_PROMPT_VERSION.to_string(),
                truncation_applied,
                build_time_ms: started.elapsed().as_millis() as u64,
            },
        })
    }
}

fn style_tone_directive(config: &Value) -> Option<String> {
    let tone = config.get("tone").and_then(Value::as_str).map(sanitize_directive);
    let style = config.get("style").and_then(Value::as_str).map(sanitize_directive);
    match (tone, style) {
        (None, None) => None,
        (Some(t), None) => Some(format!("Adopt the following tone: {t}")),
        (None, Some(s)) => Some(format!("Adopt the following style: {s}")),
        (Some(t), Some(s)) => Some(format!("Adopt the following tone and style: {t}; {s}")),
    }
}

fn sanitize_directive(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.trim().chars().take(120).collect()
}

fn interpolate_step_prompt(step_prompt: &str, input_value: &Value) -> Result<String, PromptBuildError> {
    if step_prompt.contains("{{input}}") {
        let canonical =
            serde_json::to_string(input_value).map_err(|e| PromptBuildError(e.to_string()))?;
        Ok(step_prompt.replace("{{input}}", &canonical))
    } else {
        Ok(step_prompt.to_string())
    }
}

fn output_format_directive(config: &Value) -> Option<String> {
    match config.get("outputFormat").and_then(Value::as_str) {
        Some("json") => Some("Respond with a single JSON value and no surrounding prose.".to_string()),
        Some("markdown") => Some("Respond using Markdown; headings and lists are permitted.".to_string()),
        _ => None,
    }
}

fn retrieved_context_message(state: &Value) -> Option<Message> {
    let count = state
        .get(fields::CONTEXT_META)
        .and_then(|meta| meta.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    if count == 0 {
        return None;
    }
    state
        .get(fields::RETRIEVED_CONTEXT)
        .and_then(Value::as_str)
        .map(|text| Message::system(format!("Retrieved context:\n{text}")))
}

fn use_memory(config: &Value) -> bool {
    config.get("useMemory").and_then(Value::as_bool).unwrap_or(false)
}

fn memory_size(config: &Value, options: &PromptOptions) -> usize {
    options
        .memory_size_override
        .or_else(|| config.get("memorySize").and_then(Value::as_u64).map(|n| n as usize))
        .unwrap_or(0)
}

fn memory_turns(state: &Value, memory_size: usize) -> Vec<Message> {
    let Some(turns) = state.get(fields::MEMORY).and_then(Value::as_array) else {
        return Vec::new();
    };
    let start = turns.len().saturating_sub(memory_size);
    turns[start..].iter().filter_map(memory_turn_to_message).collect()
}

fn memory_turn_to_message(turn: &Value) -> Option<Message> {
    let role = turn.get("role").and_then(Value::as_str)?;
    let content = turn.get("content").and_then(Value::as_str)?.to_string();
    match role {
        "user" | "human" => Some(Message::human(content)),
        "assistant" | "ai" => Some(Message::assistant(content)),
        "system" => Some(Message::system(content)),
        _ => None,
    }
}

/// Guarantees a "user-first" conversation body for providers that reject
/// assistant-first inputs: the body here is `memory_messages` followed by
/// `user_message`.
fn normalize_user_first(
    memory_messages: &mut Vec<Message>,
    user_message: &mut Option<Message>,
    user_prompt: &str,
) {
    let seed = || {
        if user_prompt.is_empty() {
            "Continue.".to_string()
        } else {
            user_prompt.to_string()
        }
    };

    match memory_messages.first() {
        None => {
            if user_message.is_none() {
                *user_message = Some(Message::human(seed()));
            }
        }
        Some(first) if first.role == MessageRole::Assistant => {
            memory_messages.insert(0, Message::human(seed()));
        }
        _ => {}
    }
}

#[allow(clippy::too_many_arguments)]
fn truncate_to_budget(
    capability: &ModelCapability,
    system_prefix: &[Message],
    retrieved_context_message: &mut Option<Message>,
    memory_messages: &mut Vec<Message>,
    user_message: &mut Option<Message>,
    truncation_applied: &mut bool,
) {
    let budget = capability
        .context_window
        .saturating_sub(capability.reserved_output_tokens);

    loop {
        let assembled = assemble(system_prefix, retrieved_context_message, memory_messages, user_message);
        let total_chars: usize = assembled.iter().map(message_text_len).sum();
        let tokens = capability.tokenizer.estimate(total_chars, assembled.len());
        if tokens <= budget {
            return;
        }

        if !memory_messages.is_empty() {
            memory_messages.remove(0);
            *truncation_applied = true;
            continue;
        }

        if let Some(message) = retrieved_context_message {
            if shorten_in_place(message, Half) {
                *truncation_applied = true;
                continue;
            }
            *retrieved_context_message = None;
            *truncation_applied = true;
            continue;
        }

        if let Some(message) = user_message {
            if shorten_in_place(message, Tail) {
                *truncation_applied = true;
            }
        }
        return;
    }
}

#[derive(Clone, Copy)]
enum ShortenMode {
    Half,
    Tail,
}
use ShortenMode::{Half, Tail};

/// Shortens a text message in place. Returns `false` once the text is too
/// short to usefully shorten further (the caller then drops the message).
fn shorten_in_place(message: &mut Message, mode: ShortenMode) -> bool {
    let MessageContent::Text(text) = &mut message.content else {
        return false;
    };
    let char_count = text.chars().count();
    if char_count <= 40 {
        return false;
    }
    let keep = char_count / 2;
    *text = match mode {
        ShortenMode::Half => text.chars().take(keep).collect(),
        ShortenMode::Tail => text.chars().skip(char_count - keep).collect(),
    };
    true
}

fn assemble(
    system_prefix: &[Message],
    retrieved_context_message: &Option<Message>,
    memory_messages: &[Message],
    user_message: &Option<Message>,
) -> Vec<Message> {
    let mut out = system_prefix.to_vec();
    out.extend(retrieved_context_message.iter().cloned());
    out.extend(memory_messages.iter().cloned());
    out.extend(user_message.iter().cloned());
    out
}

fn message_text_len(message: &Message) -> usize {
    match &message.content {
        MessageContent::Text(text) => text.len(),
        MessageContent::Parts(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        ApiModelIds, InferenceType, Modality, Pricing, TokenizerMode, TokenizerSpec,
    };
    use serde_json::json;

    fn capability(context_window: u32) -> ModelCapability {
        ModelCapability {
            id: "test-model".to_string(),
            provider: "test".to_string(),
            context_window,
            modalities: vec![Modality::Text],
            parameter_specs: Vec::new(),
            api_conventions: serde_json::Map::new(),
            tokenizer: TokenizerSpec {
                mode: TokenizerMode::Estimate,
                chars_per_token: 1.0,
                overhead: 0,
            },
            reserved_output_tokens: 10,
            pricing: Pricing {
                input_cost_per_unit: 0.0,
                output_cost_per_unit: 0.0,
            },
            api_model_ids: ApiModelIds {
                on_demand: Some("test-model".to_string()),
                serverless: None,
                default_inference_type: InferenceType::OnDemand,
            },
            flags: Vec::new(),
        }
    }

    #[test]
    fn interpolates_input_into_step_prompt() {
        let engine = PromptEngine::new();
        let state = json!({ "userPrompt": "hi", "input": {"amount": 5} });
        let outcome = engine
            .build(&state, &capability(10_000), "Process {{input}} now", &PromptOptions::default())
            .unwrap();

        let step_message = &outcome.messages[0];
        assert_eq!(step_message.text(), Some(r#"Process {"amount":5} now"#));
    }

    #[test]
    fn normalizes_missing_user_turn_with_seed() {
        let engine = PromptEngine::new();
        let state = json!({ "userPrompt": "" });
        let outcome = engine
            .build(&state, &capability(10_000), "be helpful", &PromptOptions::default())
            .unwrap();

        assert!(outcome
            .messages
            .iter()
            .any(|m| m.role == MessageRole::Human));
    }

    #[test]
    fn includes_recent_memory_turns_when_enabled() {
        let engine = PromptEngine::new();
        let state = json!({
            "userPrompt": "thanks",
            "currentNodeConfig": {"useMemory": true, "memorySize": 1},
            "memory": [
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "second"},
            ],
        });
        let outcome = engine
            .build(&state, &capability(10_000), "reply", &PromptOptions::default())
            .unwrap();

        let texts: Vec<_> = outcome.messages.iter().filter_map(|m| m.text()).collect();
        assert!(texts.contains(&"second"));
        assert!(!texts.contains(&"first"));
    }

    #[test]
    fn truncates_memory_oldest_first_when_over_budget() {
        let engine = PromptEngine::new();
        let long_turn = "x".repeat(200);
        let state = json!({
            "userPrompt": "go",
            "currentNodeConfig": {"useMemory": true, "memorySize": 3},
            "memory": [
                {"role": "user", "content": long_turn.clone()},
                {"role": "assistant", "content": long_turn.clone()},
                {"role": "user", "content": "recent"},
            ],
        });
        // tiny context window forces truncation
        let outcome = engine
            .build(&state, &capability(30), "reply", &PromptOptions::default())
            .unwrap();

        assert!(outcome.metadata.truncation_applied);
        let texts: Vec<_> = outcome.messages.iter().filter_map(|m| m.text()).collect();
        assert!(!texts.iter().any(|t| *t == long_turn));
    }
}
