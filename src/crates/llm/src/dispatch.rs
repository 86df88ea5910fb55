//! Provider-neutral dispatch: resolves a capability id to a concrete
//! [`ChatModel`] and forwards the call.
//!
//! Node code (e.g. `ModelInvoke`) should depend only on this dispatcher and
//! the [`ModelRegistry`](crate::registry::ModelRegistry), never on a specific
//! provider client, so that adding a model is a registration-time change.

use crate::error::{LlmError, Result};
use crate::registry::ModelRegistry;
use langgraph_core::llm::{ChatModel, ChatRequest, ChatResponse, ChatStreamResponse};
use std::collections::HashMap;
use std::sync::Arc;

/// Binds each registered capability id to the [`ChatModel`] that serves it.
///
/// Construction is the caller's responsibility (typically at process
/// startup, from the same configuration that built the [`ModelRegistry`]):
/// for every [`ModelCapability`](crate::registry::ModelCapability) there
/// should be a corresponding entry here, keyed by `capability.id`.
pub struct ModelProviderDispatch {
    registry: Arc<ModelRegistry>,
    clients: HashMap<String, Arc<dyn ChatModel>>,
}

impl ModelProviderDispatch {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            clients: HashMap::new(),
        }
    }

    /// Register the client that should serve a given capability id.
    pub fn register(&mut self, capability_id: impl Into<String>, client: Arc<dyn ChatModel>) {
        self.clients.insert(capability_id.into(), client);
    }

    /// Resolve `capability_id` to its capability and client, failing if either is missing.
    fn resolve(&self, capability_id: &str) -> Result<&Arc<dyn ChatModel>> {
        self.registry.lookup(capability_id)?;
        self.clients
            .get(capability_id)
            .ok_or_else(|| LlmError::ModelNotFound(capability_id.to_string()))
    }

    /// Invoke a complete (non-streaming) chat call against the model behind `capability_id`.
    pub async fn invoke(&self, capability_id: &str, request: ChatRequest) -> Result<ChatResponse> {
        let client = self.resolve(capability_id)?;
        client
            .chat(request)
            .await
            .map_err(|e| LlmError::ProviderError(e.to_string()))
    }

    /// Invoke a streaming chat call against the model behind `capability_id`.
    pub async fn invoke_stream(
        &self,
        capability_id: &str,
        request: ChatRequest,
    ) -> Result<ChatStreamResponse> {
        let client = self.resolve(capability_id)?;
        client
            .stream(request)
            .await
            .map_err(|e| LlmError::ProviderError(e.to_string()))
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{
        ApiModelIds, InferenceType, ModelCapability, Modality, Pricing, TokenizerMode, TokenizerSpec,
    };
    use async_trait::async_trait;
    use langgraph_core::error::Result as GraphResult;
    use langgraph_core::{Message, MessageContent, MessageRole};

    #[derive(Clone)]
    struct StubModel(String);

    #[async_trait]
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

    fn capability(id: &str) -> ModelCapability {
        ModelCapability {
            id: id.to_string(),
            provider: "stub".to_string(),
            context_window: 4000,
            modalities: vec![Modality::Text],
            parameter_specs: Vec::new(),
            api_conventions: serde_json::Map::new(),
            tokenizer: TokenizerSpec {
                mode: TokenizerMode::Estimate,
                chars_per_token: 4.0,
                overhead: 3,
            },
            reserved_output_tokens: 500,
            pricing: Pricing {
                input_cost_per_unit: 0.0,
                output_cost_per_unit: 0.0,
            },
            api_model_ids: ApiModelIds {
                on_demand: Some(id.to_string()),
                serverless: None,
                default_inference_type: InferenceType::OnDemand,
            },
            flags: Vec::new(),
        }
    }

    #[tokio::test]
    async fn invoke_dispatches_to_registered_client() {
        let registry = Arc::new(ModelRegistry::new(vec![capability("stub-1")], "stub-1").unwrap());
        let mut dispatch = ModelProviderDispatch::new(registry);
        dispatch.register("stub-1", Arc::new(StubModel("hi there".to_string())));

        let response = dispatch
            .invoke("stub-1", ChatRequest::new(vec![Message::human("hello")]))
            .await
            .unwrap();

        assert_eq!(response.message.text(), Some("hi there"));
    }

    #[tokio::test]
    async fn invoke_fails_on_unregistered_capability() {
        let registry = Arc::new(ModelRegistry::new(vec![capability("stub-1")], "stub-1").unwrap());
        let dispatch = ModelProviderDispatch::new(registry);

        let err = dispatch
            .invoke("stub-1", ChatRequest::new(vec![Message::human("hello")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ModelNotFound(_)));
    }

    #[tokio::test]
    async fn invoke_fails_on_unknown_capability_id() {
        let registry = Arc::new(ModelRegistry::new(vec![capability("stub-1")], "stub-1").unwrap());
        let mut dispatch = ModelProviderDispatch::new(registry);
        dispatch.register("stub-1", Arc::new(StubModel("hi".to_string())));

        let err = dispatch
            .invoke("unknown", ChatRequest::new(vec![Message::human("hello")]))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ModelNotFound(_)));
    }
}
