//! Classifies `userPrompt` into one of `config.intents` via a model call.

use async_trait::async_trait;
use langgraph_core::error::Result;
use langgraph_core::execution_state::fields;
use langgraph_core::llm::ChatRequest;
use langgraph_core::node::{NodeContext, NodeRunner};
use langgraph_core::Message;
use llm::dispatch::ModelProviderDispatch;
use serde_json::{json, Value};
use std::sync::Arc;

pub const NODE_TYPE: &str = "IntentClassifier";

pub struct IntentClassifierNode {
    dispatch: Arc<ModelProviderDispatch>,
}

impl IntentClassifierNode {
    pub fn new(dispatch: Arc<ModelProviderDispatch>) -> Self {
        Self { dispatch }
    }
}

#[async_trait]
impl NodeRunner for IntentClassifierNode {
    async fn run(&self, _ctx: &NodeContext, state: &Value, config: &Value) -> Result<Value> {
        let intents: Vec<String> = config
            .get("intents")
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let confidence_threshold = config.get("confidenceThreshold").and_then(Value::as_f64).unwrap_or(0.5);
        let fallback_intent = config.get("fallbackIntent").and_then(Value::as_str).unwrap_or("unknown").to_string();
        let model_id = config
            .get("modelId")
            .and_then(Value::as_str)
            .unwrap_or_else(|| self.dispatch.registry().default_model_id())
            .to_string();
        let user_prompt = state.get(fields::USER_PROMPT).and_then(Value::as_str).unwrap_or("");

        match self.classify(&model_id, &intents, user_prompt).await {
            Some((intent, confidence)) if confidence >= confidence_threshold && intents.contains(&intent) => {
                Ok(json!({ fields::INTENT: intent, fields::INTENT_CONFIDENCE: confidence }))
            }
            _ => Ok(json!({ fields::INTENT: fallback_intent, fields::INTENT_CONFIDENCE: 0.0 })),
        }
    }
}

impl IntentClassifierNode {
    async fn classify(&self, model_id: &str, intents: &[String], user_prompt: &str) -> Option<(String, f64)> {
        let instruction = format!(
            "Classify the user's message into exactly one of these intents: {}. Respond with strict JSON {{\"intent\": <intent>, \"confidence\": <0..1>}} and nothing else.",
            intents.join(", ")
        );
        let request = ChatRequest::new(vec![Message::system(instruction), Message::human(user_prompt)]);
        let response = self.dispatch.invoke(model_id, request).await.ok()?;
        let text = response.message.text()?;
        let parsed: Value = serde_json::from_str(text).ok()?;
        let intent = parsed.get("intent").and_then(Value::as_str)?.to_string();
        let confidence = parsed.get("confidence").and_then(Value::as_f64).unwrap_or(0.0);
        Some((intent, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait as async_trait_attr;
    use langgraph_core::error::Result as GraphResult;
    use langgraph_core::llm::{ChatModel, ChatResponse, ChatStreamResponse};
    use langgraph_core::{MessageContent, MessageRole};
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
            unimplemented!("not exercised")
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    fn capability() -> ModelCapability {
        ModelCapability {
            id: "stub".to_string(),
            provider: "stub".to_string(),
            context_window: 4000,
            modalities: vec![Modality::Text],
            parameter_specs: Vec::new(),
            api_conventions: serde_json::Map::new(),
            tokenizer: TokenizerSpec { mode: TokenizerMode::Estimate, chars_per_token: 4.0, overhead: 0 },
            reserved_output_tokens: 200,
            pricing: Pricing { input_cost_per_unit: 0.0, output_cost_per_unit: 0.0 },
            api_model_ids: ApiModelIds { on_demand: Some("stub".to_string()), serverless: None, default_inference_type: InferenceType::OnDemand },
            flags: Vec::new(),
        }
    }

    fn ctx() -> NodeContext {
        NodeContext { conversation_id: "c".to_string(), invocation_id: "i".to_string(), node_id: "intent".to_string() }
    }

    #[tokio::test]
    async fn returns_classified_intent_above_threshold() {
        let registry = Arc::new(ModelRegistry::new(vec![capability()], "stub").unwrap());
        let mut dispatch = ModelProviderDispatch::new(registry);
        dispatch.register("stub", Arc::new(StubModel(r#"{"intent": "billing", "confidence": 0.9}"#.to_string())));

        let node = IntentClassifierNode::new(Arc::new(dispatch));
        let config = json!({"intents": ["billing", "support"], "confidenceThreshold": 0.5, "fallbackIntent": "unknown"});
        let delta = node.run(&ctx(), &json!({"userPrompt": "refund please"}), &config).await.unwrap();
        assert_eq!(delta[fields::INTENT], json!("billing"));
    }

    #[tokio::test]
    async fn falls_back_when_confidence_below_threshold() {
        let registry = Arc::new(ModelRegistry::new(vec![capability()], "stub").unwrap());
        let mut dispatch = ModelProviderDispatch::new(registry);
        dispatch.register("stub", Arc::new(StubModel(r#"{"intent": "billing", "confidence": 0.1}"#.to_string())));

        let node = IntentClassifierNode::new(Arc::new(dispatch));
        let config = json!({"intents": ["billing", "support"], "confidenceThreshold": 0.5, "fallbackIntent": "unknown"});
        let delta = node.run(&ctx(), &json!({"userPrompt": "hmm"}), &config).await.unwrap();
        assert_eq!(delta[fields::INTENT], json!("unknown"));
        assert_eq!(delta[fields::INTENT_CONFIDENCE], json!(0.0));
    }

    #[tokio::test]
    async fn falls_back_when_model_response_is_not_parseable() {
        let registry = Arc::new(ModelRegistry::new(vec![capability()], "stub").unwrap());
        let mut dispatch = ModelProviderDispatch::new(registry);
        dispatch.register("stub", Arc::new(StubModel("not json".to_string())));

        let node = IntentClassifierNode::new(Arc::new(dispatch));
        let config = json!({"intents": ["billing"], "fallbackIntent": "unknown"});
        let delta = node.run(&ctx(), &json!({"userPrompt": "??"}), &config).await.unwrap();
        assert_eq!(delta[fields::INTENT], json!("unknown"));
    }
}
