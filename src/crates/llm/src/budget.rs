//! Token Budget: projects the token and USD cost of a prospective model call
//! and enforces configured caps.
//!
//! Estimation and pricing formulas live on [`crate::registry::TokenizerSpec`]
//! and [`crate::registry::Pricing`]; this module layers the three-threshold
//! cap policy on top of them.

use crate::registry::ModelCapability;
use serde::{Deserialize, Serialize};

/// The three configured thresholds a prospective call is checked against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetCaps {
    pub request_cost_cap_usd: f64,
    pub token_cap: u32,
    pub emergency_cost_threshold_usd: f64,
}

/// Projected cost of a prospective call, before it is actually made.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BudgetProjection {
    pub input_tokens: u32,
    pub cost_usd: f64,
}

/// The outcome of checking a projection against [`BudgetCaps`].
#[derive(Debug, Clone)]
pub enum BudgetDecision {
    Allowed(BudgetProjection),
    Refused {
        projection: BudgetProjection,
        reason: String,
        /// Set when the emergency threshold was the trigger (unconditional refusal).
        emergency: bool,
    },
}

impl BudgetDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed(_))
    }

    pub fn projection(&self) -> &BudgetProjection {
        match self {
            Self::Allowed(p) => p,
            Self::Refused { projection, .. } => projection,
        }
    }
}

/// Projects and enforces cost/token caps for model calls.
#[derive(Debug, Clone, Default)]
pub struct TokenBudget;

impl TokenBudget {
    pub fn new() -> Self {
        Self
    }

    /// Project input tokens and USD cost for a message sequence of total
    /// length `len_chars` across `message_count` messages.
    pub fn project(
        &self,
        capability: &ModelCapability,
        len_chars: usize,
        message_count: usize,
    ) -> BudgetProjection {
        let input_tokens = capability.tokenizer.estimate(len_chars, message_count);
        let cost_usd = capability
            .pricing
            .estimate_cost_usd(input_tokens, capability.reserved_output_tokens);
        BudgetProjection {
            input_tokens,
            cost_usd,
        }
    }

    /// Project and check against `caps`, in priority order: emergency
    /// threshold first (unconditional refusal), then per-request cost cap,
    /// then token cap.
    pub fn check(
        &self,
        capability: &ModelCapability,
        len_chars: usize,
        message_count: usize,
        caps: &BudgetCaps,
    ) -> BudgetDecision {
        let projection = self.project(capability, len_chars, message_count);

        if projection.cost_usd >= caps.emergency_cost_threshold_usd {
            return BudgetDecision::Refused {
                projection,
                reason: format!(
                    "projected cost ${:.4} meets or exceeds the emergency threshold ${:.4}",
                    projection.cost_usd, caps.emergency_cost_threshold_usd
                ),
                emergency: true,
            };
        }
        if projection.cost_usd > caps.request_cost_cap_usd {
            return BudgetDecision::Refused {
                projection,
                reason: format!(
                    "projected cost ${:.4} exceeds the per-request cap ${:.4}",
                    projection.cost_usd, caps.request_cost_cap_usd
                ),
                emergency: false,
            };
        }
        if projection.input_tokens > caps.token_cap {
            return BudgetDecision::Refused {
                projection,
                reason: format!(
                    "projected input tokens {} exceed the cap {}",
                    projection.input_tokens, caps.token_cap
                ),
                emergency: false,
            };
        }

        BudgetDecision::Allowed(projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        ApiModelIds, InferenceType, Modality, Pricing, TokenizerMode, TokenizerSpec,
    };

    fn capability(chars_per_token: f64, input_cost: f64, output_cost: f64) -> ModelCapability {
        ModelCapability {
            id: "test-model".to_string(),
            provider: "test".to_string(),
            context_window: 8000,
            modalities: vec![Modality::Text],
            parameter_specs: Vec::new(),
            api_conventions: serde_json::Map::new(),
            tokenizer: TokenizerSpec {
                mode: TokenizerMode::Estimate,
                chars_per_token,
                overhead: 0,
            },
            reserved_output_tokens: 500,
            pricing: Pricing {
                input_cost_per_unit: input_cost,
                output_cost_per_unit: output_cost,
            },
            api_model_ids: ApiModelIds {
                on_demand: Some("test-model".to_string()),
                serverless: None,
                default_inference_type: InferenceType::OnDemand,
            },
            flags: Vec::new(),
        }
    }

    fn caps(request_cost_cap_usd: f64, token_cap: u32, emergency_cost_threshold_usd: f64) -> BudgetCaps {
        BudgetCaps {
            request_cost_cap_usd,
            token_cap,
            emergency_cost_threshold_usd,
        }
    }

    #[test]
    fn allows_a_call_within_all_caps() {
        let budget = TokenBudget::new();
        let capability = capability(4.0, 0.01, 0.02);
        let decision = budget.check(&capability, 400, 1, &caps(10.0, 10_000, 50.0));
        assert!(decision.is_allowed());
    }

    #[test]
    fn refuses_over_request_cost_cap_with_recoverable_reason() {
        let budget = TokenBudget::new();
        let capability = capability(1.0, 100.0, 100.0);
        let decision = budget.check(&capability, 4_000, 1, &caps(1.0, 1_000_000, 1_000.0));
        match decision {
            BudgetDecision::Refused { emergency, .. } => assert!(!emergency),
            BudgetDecision::Allowed(_) => panic!("expected refusal"),
        }
    }

    #[test]
    fn refuses_over_token_cap() {
        let budget = TokenBudget::new();
        let capability = capability(4.0, 0.0, 0.0);
        let decision = budget.check(&capability, 40_000, 1, &caps(100.0, 1_000, 100.0));
        match decision {
            BudgetDecision::Refused { projection, emergency, .. } => {
                assert!(!emergency);
                assert!(projection.input_tokens > 1_000);
            }
            BudgetDecision::Allowed(_) => panic!("expected refusal"),
        }
    }

    #[test]
    fn emergency_threshold_refuses_unconditionally_even_under_request_cap() {
        let budget = TokenBudget::new();
        let capability = capability(1.0, 10.0, 10.0);
        // request cap is generous; emergency threshold is the binding constraint.
        let decision = budget.check(&capability, 1_000, 1, &caps(1_000.0, 1_000_000, 5.0));
        match decision {
            BudgetDecision::Refused { emergency, .. } => assert!(emergency),
            BudgetDecision::Allowed(_) => panic!("expected emergency refusal"),
        }
    }
}
