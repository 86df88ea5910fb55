//! Model registry: an immutable, process-wide catalog of model capabilities.
//!
//! The registry is built once at startup from a configured list of
//! [`ModelCapability`] records and never mutated afterward. Nodes and the
//! Token Budget resolve everything they need to know about a model — context
//! window, tokenizer behavior, pricing, which provider owns it — through a
//! single lookup here, rather than branching on provider strings.

use crate::error::{LlmError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How a capability's token count should be estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerMode {
    /// Estimate from character count via `charsPerToken`.
    Estimate,
    /// Use a provider-accurate tokenizer (implementation-defined).
    Exact,
    /// Report zero tokens; disables input-side cap enforcement.
    Off,
}

/// Tokenizer behavior for a model capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerSpec {
    pub mode: TokenizerMode,
    /// Average characters per token, used when `mode = Estimate`.
    pub chars_per_token: f64,
    /// Fixed per-message token overhead, added once per message.
    pub overhead: u32,
}

impl TokenizerSpec {
    /// Estimate token count for a text of length `len_chars` spread across `message_count` messages.
    pub fn estimate(&self, len_chars: usize, message_count: usize) -> u32 {
        match self.mode {
            TokenizerMode::Off => 0,
            TokenizerMode::Estimate | TokenizerMode::Exact => {
                let chars = (len_chars as f64 / self.chars_per_token).ceil() as u32;
                chars + self.overhead * message_count as u32
            }
        }
    }
}

/// Per-token pricing for a capability, in USD per 1000 tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pricing {
    pub input_cost_per_unit: f64,
    pub output_cost_per_unit: f64,
}

impl Pricing {
    /// `inputCostPerUnit * inputTokens / 1000 + outputCostPerUnit * reservedOutputTokens / 1000`.
    pub fn estimate_cost_usd(&self, input_tokens: u32, reserved_output_tokens: u32) -> f64 {
        self.input_cost_per_unit * input_tokens as f64 / 1000.0
            + self.output_cost_per_unit * reserved_output_tokens as f64 / 1000.0
    }
}

/// How the model provider should be addressed for a given capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiModelIds {
    /// Model id to use for on-demand (pay-per-call) invocation.
    pub on_demand: Option<String>,
    /// Model id to use for serverless/batch invocation.
    pub serverless: Option<String>,
    /// Which variant to prefer when both are configured.
    pub default_inference_type: InferenceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceType {
    OnDemand,
    Serverless,
}

impl ApiModelIds {
    /// Resolve the concrete provider-side model id for the preferred inference type.
    pub fn resolve(&self) -> Option<&str> {
        match self.default_inference_type {
            InferenceType::OnDemand => self.on_demand.as_deref().or(self.serverless.as_deref()),
            InferenceType::Serverless => self.serverless.as_deref().or(self.on_demand.as_deref()),
        }
    }
}

/// An input or output modality a model supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    Audio,
}

/// A parameter a model accepts, along with its valid range (informational only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub default: Option<f64>,
}

/// Provider-specific conventions the caller must respect (e.g. system message
/// placement, tool-call wire format). Kept opaque here; nodes consult it only
/// when they need provider-specific behavior.
pub type ApiConventions = serde_json::Map<String, serde_json::Value>;

/// A named capability flag a model may be registered as supporting, e.g.
/// `"tool_calling"`, `"streaming"`, `"vision"`.
pub type CapabilityFlag = String;

/// Immutable record describing one addressable model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCapability {
    pub id: String,
    pub provider: String,
    pub context_window: u32,
    pub modalities: Vec<Modality>,
    pub parameter_specs: Vec<ParameterSpec>,
    pub api_conventions: ApiConventions,
    pub tokenizer: TokenizerSpec,
    pub reserved_output_tokens: u32,
    pub pricing: Pricing,
    pub api_model_ids: ApiModelIds,
    /// Capability flags this model is registered as supporting (e.g. `streaming`, `tool_calling`).
    #[serde(default)]
    pub flags: Vec<CapabilityFlag>,
}

impl ModelCapability {
    pub fn supports(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

/// Strips a leading region token such as `us.` or `eu.` from a model id.
///
/// Region tokens are a single lowercase segment followed by a dot, e.g.
/// `us.claude-3-opus` normalizes to `claude-3-opus`. Ids with no such prefix
/// are returned unchanged.
fn strip_region_prefix(id: &str) -> &str {
    if let Some((prefix, rest)) = id.split_once('.') {
        if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_lowercase()) && !rest.is_empty()
        {
            return rest;
        }
    }
    id
}

/// Process-wide immutable mapping from model id to capability.
///
/// Built once at startup via [`ModelRegistry::new`] and never mutated after.
/// A lookup miss is a hard error — the registry never silently substitutes a
/// default model.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    capabilities: HashMap<String, ModelCapability>,
    default_model_id: String,
}

impl ModelRegistry {
    /// Build a registry from a capability list and a configured default model id.
    ///
    /// Fails if `default_model_id` does not name one of the supplied capabilities,
    /// since a registry that cannot resolve its own default is misconfigured.
    pub fn new(capabilities: Vec<ModelCapability>, default_model_id: impl Into<String>) -> Result<Self> {
        let default_model_id = default_model_id.into();
        let capabilities: HashMap<String, ModelCapability> =
            capabilities.into_iter().map(|c| (c.id.clone(), c)).collect();

        if !capabilities.contains_key(strip_region_prefix(&default_model_id)) {
            return Err(LlmError::ConfigError(format!(
                "default model id '{}' is not present in the registered capability set",
                default_model_id
            )));
        }

        Ok(Self {
            capabilities,
            default_model_id,
        })
    }

    /// Look up a capability by id, normalizing a leading region token.
    ///
    /// Returns a *registry miss* error for unknown ids; callers must not
    /// substitute a default on failure.
    pub fn lookup(&self, id: &str) -> Result<&ModelCapability> {
        let normalized = strip_region_prefix(id);
        self.capabilities
            .get(normalized)
            .ok_or_else(|| LlmError::ModelNotFound(id.to_string()))
    }

    /// The configured default model id, resolved through the same normalization as `lookup`.
    pub fn default_capability(&self) -> &ModelCapability {
        self.lookup(&self.default_model_id)
            .expect("default model id was validated at construction")
    }

    pub fn default_model_id(&self) -> &str {
        &self.default_model_id
    }

    /// All capabilities registered under a given provider name.
    pub fn by_provider(&self, provider: &str) -> Vec<&ModelCapability> {
        self.capabilities
            .values()
            .filter(|c| c.provider == provider)
            .collect()
    }

    /// All capabilities that declare support for a given capability flag.
    pub fn with_capability(&self, flag: &str) -> Vec<&ModelCapability> {
        self.capabilities
            .values()
            .filter(|c| c.supports(flag))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
