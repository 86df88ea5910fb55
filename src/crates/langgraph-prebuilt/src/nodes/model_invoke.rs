//! Resolves a model, assembles the prompt, checks the token/cost budget,
//! invokes the model (optionally streaming), and writes `modelResponse`.

use async_trait::async_trait;
use langgraph_core::error::{GraphError, Result};
use langgraph_core::execution_state::fields;
use langgraph_core::llm::ChatRequest;
use langgraph_core::node::{NodeContext, NodeRunner};
use langgraph_core::progress::{ProgressEventKind, ProgressSink};
use llm::dispatch::ModelProviderDispatch;
use llm::{BudgetCaps, BudgetDecision, PromptEngine, PromptOptions, TokenBudget};
use serde_json::{json, Value};
use std::sync::Arc;
use tooling::async_utils::retry::RetryPolicy;

pub const NODE_TYPE: &str = "ModelInvoke";

/// Bounded retry count for transient provider errors (see the error taxonomy).
const PROVIDER_RETRY_ATTEMPTS: usize = 3;

pub struct ModelInvokeNode {
    dispatch: Arc<ModelProviderDispatch>,
    prompt_engine: Arc<PromptEngine>,
    budget: Arc<TokenBudget>,
    progress: Arc<dyn ProgressSink>,
    caps: BudgetCaps,
}

impl ModelInvokeNode {
    pub fn new(
        dispatch: Arc<ModelProviderDispatch>,
        prompt_engine: Arc<PromptEngine>,
        budget: Arc<TokenBudget>,
        progress: Arc<dyn ProgressSink>,
        caps: BudgetCaps,
    ) -> Self {
        Self { dispatch, prompt_engine, budget, progress, caps }
    }

    async fn invoke_streaming(&self, ctx: &NodeContext, model_id: &str, request: ChatRequest) -> Result<String> {
        use futures::StreamExt;

        let mut stream_response = self
            .dispatch
            .invoke_stream(model_id, request)
            .await
            .map_err(|e| GraphError::node_execution(&ctx.node_id, format!("MODEL_CALL_FAILED: {e}")))?;

        let mut accumulated = String::new();
        while let Some(chunk) = stream_response.stream.next().await {
            accumulated.push_str(&chunk.content);
            self.progress
                .emit(
                    &ctx.conversation_id,
                    &ctx.invocation_id,
                    &ctx.node_id,
                    ProgressEventKind::Streaming,
                    Some(json!({"chunk": chunk.content})),
                )
                .await
                .ok();
        }
        Ok(accumulated)
    }
}

#[async_trait]
impl NodeRunner for ModelInvokeNode {
    async fn run(&self, ctx: &NodeContext, state: &Value, config: &Value) -> Result<Value> {
        let model_id = config
            .get("modelId")
            .and_then(Value::as_str)
            .unwrap_or_else(|| self.dispatch.registry().default_model_id())
            .to_string();
        let capability = self
            .dispatch
            .registry()
            .lookup(&model_id)
            .map_err(|e| GraphError::node_execution(&ctx.node_id, format!("MODEL_CALL_FAILED: {e}")))?;

        let step_prompt = config.get("systemPrompt").and_then(Value::as_str).unwrap_or("");
        let prompt_outcome = self
            .prompt_engine
            .build(state, capability, step_prompt, &PromptOptions::default())
            .map_err(|e| GraphError::node_execution(&ctx.node_id, format!("PROMPT_BUILD_FAILED: {e}")))?;

        let total_chars: usize = prompt_outcome
            .messages
            .iter()
            .filter_map(|m| m.text())
            .map(str::len)
            .sum();
        let decision = self.budget.check(capability, total_chars, prompt_outcome.messages.len(), &self.caps);

        let projection = match decision {
            BudgetDecision::Allowed(projection) => projection,
            BudgetDecision::Refused { reason, .. } => {
                self.progress
                    .emit(
                        &ctx.conversation_id,
                        &ctx.invocation_id,
                        &ctx.node_id,
                        ProgressEventKind::Error,
                        Some(json!({"code": "BUDGET_EXCEEDED", "message": reason.clone()})),
                    )
                    .await
                    .ok();
                return Err(GraphError::Budget(reason));
            }
        };

        let streaming = config.get("streaming").and_then(Value::as_bool).unwrap_or(false) && capability.supports("streaming");

        let response_text = if streaming {
            self.invoke_streaming(ctx, &model_id, ChatRequest::new(prompt_outcome.messages.clone())).await?
        } else {
            let policy = RetryPolicy::new(PROVIDER_RETRY_ATTEMPTS);
            let mut last_err = None;
            let mut result = None;
            for attempt in 0..policy.max_attempts {
                match self.dispatch.invoke(&model_id, ChatRequest::new(prompt_outcome.messages.clone())).await {
                    Ok(response) => {
                        result = Some(response.message.text().unwrap_or("").to_string());
                        break;
                    }
                    Err(e) if attempt + 1 < policy.max_attempts => {
                        last_err = Some(e);
                    }
                    Err(e) => {
                        last_err = Some(e);
                        break;
                    }
                }
            }
            result.ok_or_else(|| {
                GraphError::node_execution(
                    &ctx.node_id,
                    format!("MODEL_CALL_FAILED: {}", last_err.map(|e| e.to_string()).unwrap_or_default()),
                )
            })?
        };

        Ok(json!({
            fields::MODEL_RESPONSE: response_text,
            "modelUsage": {
                "inputTokens": projection.input_tokens,
                "costEstimateUsd": projection.cost_usd,
            },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as async_trait_attr;
    use langgraph_core::error::Result as GraphResult;
    use langgraph_core::llm::{ChatModel, ChatResponse, ChatStreamResponse};
    use langgraph_core::progress::InMemoryProgressSink;
    use langgraph_core::{Message, MessageContent, MessageRole};
    use llm::registry::{ApiModelIds, InferenceType, ModelCapability, Modality, ModelRegistry, Pricing, TokenizerMode, TokenizerSpec};

    #[derive(Clone)]
    struct StubModel(String);

    #[async_trait_attr]
    impl ChatModel for StubModel {
        async fn chat(&self, _request: ChatRequest) -> GraphResult<ChatResponse> {
            Ok(ChatResponse {
                message: Message {
                    id: None,
                    role: MessageRole::Assistant,
                    content: MessageContent::Text(self.0.clone()),
                    name: None,
                    tool_calls: None,
                    tool_call_id: None,
                    metadata: None,
                },
                usage: None,
                reasoning: None,
                metadata: std::collections::HashMap::new(),
            })
        }

        async fn stream(&self, _request: ChatRequest) -> GraphResult<ChatStreamResponse> {
            unimplemented!("not exercised in this test")
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    fn capability(input_cost: f64) -> ModelCapability {
        ModelCapability {
            id: "stub".to_string(),
            provider: "stub".to_string(),
            context_window: 4000,
            modalities: vec![Modality::Text],
            parameter_specs: Vec::new(),
            api_conventions: serde_json::Map::new(),
            tokenizer: TokenizerSpec { mode: TokenizerMode::Estimate, chars_per_token: 4.0, overhead: 0 },
            reserved_output_tokens: 200,
            pricing: Pricing { input_cost_per_unit: input_cost, output_cost_per_unit: input_cost },
            api_model_ids: ApiModelIds { on_demand: Some("stub".to_string()), serverless: None, default_inference_type: InferenceType::OnDemand },
            flags: Vec::new(),
        }
    }

    fn caps(cost_cap: f64) -> BudgetCaps {
        BudgetCaps { request_cost_cap_usd: cost_cap, token_cap: 100_000, emergency_cost_threshold_usd: cost_cap * 100.0 }
    }

    fn ctx() -> NodeContext {
        NodeContext { conversation_id: "c".to_string(), invocation_id: "i".to_string(), node_id: "invoke".to_string() }
    }

    fn state() -> Value {
        json!({"userPrompt": "hello", "memory": [], "currentNodeConfig": {}})
    }

    #[tokio::test]
    async fn writes_model_response_on_success() {
        let registry = Arc::new(ModelRegistry::new(vec![capability(0.0)], "stub").unwrap());
        let mut dispatch = ModelProviderDispatch::new(registry);
        dispatch.register("stub", Arc::new(StubModel("hi there".to_string())));

        let node = ModelInvokeNode::new(
            Arc::new(dispatch),
            Arc::new(PromptEngine::new()),
            Arc::new(TokenBudget::new()),
            Arc::new(InMemoryProgressSink::new()),
            caps(10.0),
        );

        let delta = node.run(&ctx(), &state(), &json!({})).await.unwrap();
        assert_eq!(delta[fields::MODEL_RESPONSE], json!("hi there"));
    }

    #[tokio::test]
    async fn budget_refusal_emits_error_progress_and_returns_budget_error() {
        let registry = Arc::new(ModelRegistry::new(vec![capability(1000.0)], "stub").unwrap());
        let mut dispatch = ModelProviderDispatch::new(registry);
        dispatch.register("stub", Arc::new(StubModel("unreachable".to_string())));

        let progress = Arc::new(InMemoryProgressSink::new());
        let node = ModelInvokeNode::new(
            Arc::new(dispatch),
            Arc::new(PromptEngine::new()),
            Arc::new(TokenBudget::new()),
            progress.clone(),
            caps(0.001),
        );

        let err = node.run(&ctx(), &state(), &json!({})).await.unwrap_err();
        assert_eq!(err.code(), "BUDGET_EXCEEDED");

        let events = progress.events().await;
        assert!(events.iter().any(|e| e.kind == langgraph_core::progress::ProgressEventKind::Error));
    }
}
