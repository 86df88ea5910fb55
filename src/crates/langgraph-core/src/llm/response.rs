//! Response types returned by [`crate::llm::traits::ChatModel`].

use crate::llm_stream::MessageChunkStream;
use crate::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Token usage reported by a model call, when the provider exposes it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub reasoning_tokens: Option<u32>,
    pub total_tokens: u32,
}

/// A thinking model's separated reasoning trace (`ReasoningMode::Separated`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningContent {
    pub content: String,
}

/// The result of a complete, non-streaming chat call.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub message: Message,
    pub usage: Option<UsageMetadata>,
    pub reasoning: Option<ReasoningContent>,
    pub metadata: HashMap<String, Value>,
}

/// The result of a streaming chat call: a live chunk stream plus, for
/// thinking models, a separate stream of reasoning chunks.
pub struct ChatStreamResponse {
    pub stream: MessageChunkStream,
    pub reasoning_stream: Option<MessageChunkStream>,
}

impl std::fmt::Debug for ChatStreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatStreamResponse").finish_non_exhaustive()
    }
}
