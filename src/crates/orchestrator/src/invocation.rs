//! The invocation-request entrypoint: wires the Model Registry/Dispatch,
//! Prompt Engine, Token Budget, Node Registry, Progress Channel and Graph
//! Executor together and accepts an [`InvocationRequest`].
//!
//! Response is acknowledgement-only — the actual generation surfaces through
//! the Progress Channel, never through this call's return value. See
//! [`crate::progress_channel`] for the fan-out side and
//! [`langgraph_core::executor`] for the step loop this drives.

use crate::config::ProcessConfig;
use crate::progress_channel::DualWriteProgressSink;
use langgraph_checkpoint::CheckpointSaver;
use langgraph_core::error::{GraphError, Result};
use langgraph_core::execution_state::{self, fields, InvocationRequest};
use langgraph_core::executor::{resume_state, ExecutorOutcome, GraphExecutor};
use langgraph_core::node::NodeRegistry;
use langgraph_prebuilt::nodes::{
    conversation_memory, format, intent_classifier, model_invoke, router, slot_tracker,
    stream_to_client, vector_search, vector_write,
};
use langgraph_prebuilt::{
    ConversationMemoryNode, FormatNode, IntentClassifierNode, ModelInvokeNode, RouterNode,
    SharedConversationStore, SharedVectorIndex, SharedWorkflowStore, SlotTrackerNode,
    StreamToClientNode, VectorSearchNode, VectorWriteNode,
};
use llm::dispatch::ModelProviderDispatch;
use llm::{PromptEngine, TokenBudget};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// What the transport gets back: an acknowledgement only. Outputs flow
/// through the Progress Channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationAck {
    pub invocation_id: String,
    pub conversation_id: String,
    pub suspended: bool,
}

/// Process-wide assembly of the invocation pipeline's services, built once
/// at startup and reused across invocations.
pub struct InvocationContext {
    node_registry: NodeRegistry,
    progress: Arc<DualWriteProgressSink>,
    checkpoint_saver: Arc<dyn CheckpointSaver>,
    workflows: SharedWorkflowStore,
    process_config: ProcessConfig,
}

impl InvocationContext {
    /// Assemble the node registry from already-constructed services.
    /// `dispatch` must already carry a registered client for every
    /// capability the configured workflows can reach; provisioning provider
    /// credentials is the caller's responsibility, not this entrypoint's.
    pub fn new(
        process_config: ProcessConfig,
        dispatch: Arc<ModelProviderDispatch>,
        progress: Arc<DualWriteProgressSink>,
        checkpoint_saver: Arc<dyn CheckpointSaver>,
        workflows: SharedWorkflowStore,
        conversation_store: SharedConversationStore,
        vector_index: SharedVectorIndex,
    ) -> Self {
        let prompt_engine = Arc::new(PromptEngine::new());
        let budget = Arc::new(TokenBudget::new());
        let caps = process_config.budget_caps();

        let mut node_registry = NodeRegistry::new();
        node_registry.register(
            conversation_memory::NODE_TYPE,
            Arc::new(ConversationMemoryNode::new(conversation_store)),
        );
        node_registry.register(format::NODE_TYPE, Arc::new(FormatNode::new()));
        node_registry.register(
            intent_classifier::NODE_TYPE,
            Arc::new(IntentClassifierNode::new(dispatch.clone())),
        );
        node_registry.register(
            model_invoke::NODE_TYPE,
            Arc::new(ModelInvokeNode::new(
                dispatch,
                prompt_engine,
                budget,
                progress.clone(),
                caps,
            )),
        );
        node_registry.register(router::NODE_TYPE, Arc::new(RouterNode::new()));
        node_registry.register(slot_tracker::NODE_TYPE, Arc::new(SlotTrackerNode::new()));
        node_registry.register(
            stream_to_client::NODE_TYPE,
            Arc::new(StreamToClientNode::new(progress.clone())),
        );
        node_registry.register(
            vector_search::NODE_TYPE,
            Arc::new(VectorSearchNode::new(vector_index.clone())),
        );
        node_registry.register(vector_write::NODE_TYPE, Arc::new(VectorWriteNode::new(vector_index)));

        Self {
            node_registry,
            progress,
            checkpoint_saver,
            workflows,
            process_config,
        }
    }

    fn executor(&self) -> GraphExecutor {
        GraphExecutor::new(self.node_registry.clone(), self.progress.clone())
            .with_checkpoint_saver(self.checkpoint_saver.clone())
            .with_step_cap(self.process_config.step_cap)
    }

    /// Resolve the request's workflow, seed or resume state, register the
    /// invocation's progress owner set, and drive the step loop to
    /// completion or suspension.
    pub async fn accept(&self, request: InvocationRequest) -> Result<InvocationAck> {
        let workflow = self
            .workflows
            .get(&request.workflow_id)
            .await
            .ok_or_else(|| {
                GraphError::Validation(format!("unknown workflow id '{}'", request.workflow_id))
            })?;

        let schema = execution_state::canonical_schema();
        let state = match resume_state(
            &self.checkpoint_saver,
            &schema,
            &request.conversation_id,
            &request.user_prompt,
        )
        .await?
        {
            Some(resumed) => resumed,
            None => execution_state::fresh(&request),
        };

        let owners_for_progress: Vec<String> = state
            .get(fields::OWNERS_FOR_PROGRESS)
            .and_then(|v| v.as_array())
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        self.progress
            .set_owners(&request.conversation_id, &request.user_id, &owners_for_progress);

        let invocation_id = Uuid::new_v4().to_string();
        let outcome = self
            .executor()
            .run(&workflow, &request.conversation_id, &invocation_id, state)
            .await?;

        Ok(InvocationAck {
            invocation_id,
            conversation_id: request.conversation_id,
            suspended: matches!(outcome, ExecutorOutcome::Suspended(_)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress_channel::InMemoryProgressStore;
    use async_trait::async_trait;
    use langgraph_checkpoint::InMemoryCheckpointSaver;
    use langgraph_core::error::Result as GraphResult;
    use langgraph_core::llm::{ChatModel, ChatRequest, ChatResponse, ChatStreamResponse};
    use langgraph_core::workflow::{WorkflowDefinition, WorkflowEdge, WorkflowNode};
    use langgraph_core::{Message, MessageContent, MessageRole};
    use langgraph_prebuilt::{InMemoryConversationStore, InMemoryVectorIndex, InMemoryWorkflowStore};
    use llm::registry::{
        ApiModelIds, InferenceType, ModelCapability, Modality, ModelRegistry, Pricing,
        TokenizerMode, TokenizerSpec,
    };
    use serde_json::json;

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

    fn stub_capability() -> ModelCapability {
        ModelCapability {
            id: "stub-model".to_string(),
            provider: "stub".to_string(),
            context_window: 8000,
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
                on_demand: Some("stub-model".to_string()),
                serverless: None,
                default_inference_type: InferenceType::OnDemand,
            },
            flags: vec!["streaming".to_string()],
        }
    }

    fn single_shot_workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            id: "wf-greeting".to_string(),
            name: "single-shot generation".to_string(),
            entry_point: "memory".to_string(),
            nodes: vec![
                WorkflowNode {
                    id: "memory".to_string(),
                    node_type: conversation_memory::NODE_TYPE.to_string(),
                    config: json!({}),
                },
                WorkflowNode {
                    id: "invoke".to_string(),
                    node_type: model_invoke::NODE_TYPE.to_string(),
                    config: json!({"modelId": "stub-model"}),
                },
                WorkflowNode {
                    id: "format".to_string(),
                    node_type: format::NODE_TYPE.to_string(),
                    config: json!({"outputFormat": "text"}),
                },
                WorkflowNode {
                    id: "stream".to_string(),
                    node_type: stream_to_client::NODE_TYPE.to_string(),
                    config: json!({}),
                },
            ],
            edges: vec![
                WorkflowEdge { id: "e1".to_string(), from: "memory".to_string(), to: "invoke".to_string() },
                WorkflowEdge { id: "e2".to_string(), from: "invoke".to_string(), to: "format".to_string() },
                WorkflowEdge { id: "e3".to_string(), from: "format".to_string(), to: "stream".to_string() },
            ],
        }
    }

    async fn context() -> (InvocationContext, Arc<InMemoryProgressStore>, Arc<InMemoryCheckpointSaver>) {
        let registry = Arc::new(ModelRegistry::new(vec![stub_capability()], "stub-model").unwrap());
        let mut dispatch = ModelProviderDispatch::new(registry);
        dispatch.register("stub-model", Arc::new(StubModel("hi there".to_string())));

        let progress_store = Arc::new(InMemoryProgressStore::new());
        let progress = Arc::new(DualWriteProgressSink::new(progress_store.clone()));
        let checkpoint_saver = Arc::new(InMemoryCheckpointSaver::new());
        let workflows = Arc::new(InMemoryWorkflowStore::new());
        workflows.put(single_shot_workflow()).await;

        let ctx = InvocationContext::new(
            ProcessConfig::default(),
            Arc::new(dispatch),
            progress,
            checkpoint_saver.clone(),
            workflows,
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(InMemoryVectorIndex::new()),
        );
        (ctx, progress_store, checkpoint_saver)
    }

    #[tokio::test]
    async fn single_shot_invocation_completes_and_fans_out_progress_to_owner_set() {
        let (ctx, progress_store, _saver) = context().await;

        let request = InvocationRequest {
            workflow_id: "wf-greeting".to_string(),
            user_id: "user-1".to_string(),
            conversation_id: "conv-1".to_string(),
            user_prompt: "Hello".to_string(),
            allowed_document_ids: Vec::new(),
        };

        let ack = ctx.accept(request).await.unwrap();
        assert!(!ack.suspended);
        assert_eq!(ack.conversation_id, "conv-1");

        let rows = progress_store.rows().await;
        assert!(rows.iter().any(|r| r.owner == "user-1"));
        assert!(rows
            .iter()
            .any(|r| r.event.node_id == "stream"
                && r.event.payload.as_ref().and_then(|p| p.get(fields::FORMATTED_RESPONSE)).is_some()));
    }

    #[tokio::test]
    async fn unknown_workflow_id_is_rejected_before_any_state_is_touched() {
        let (ctx, _progress_store, saver) = context().await;

        let request = InvocationRequest {
            workflow_id: "does-not-exist".to_string(),
            user_id: "user-1".to_string(),
            conversation_id: "conv-2".to_string(),
            user_prompt: "hi".to_string(),
            allowed_document_ids: Vec::new(),
        };

        let err = ctx.accept(request).await.unwrap_err();
        assert!(matches!(err, GraphError::Validation(_)));

        let saver_dyn: Arc<dyn CheckpointSaver> = saver;
        assert!(langgraph_core::persistence::load_state(&saver_dyn, "conv-2")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn completed_invocation_persists_a_resumable_snapshot() {
        let (ctx, _progress_store, saver) = context().await;

        let request = InvocationRequest {
            workflow_id: "wf-greeting".to_string(),
            user_id: "user-1".to_string(),
            conversation_id: "conv-3".to_string(),
            user_prompt: "Hello".to_string(),
            allowed_document_ids: Vec::new(),
        };
        ctx.accept(request).await.unwrap();

        let saver: Arc<dyn CheckpointSaver> = saver;
        let snapshot = langgraph_core::persistence::load_state(&saver, "conv-3").await.unwrap();
        assert!(snapshot.is_some());
        assert_eq!(snapshot.unwrap()[fields::MODEL_RESPONSE], json!("hi there"));
    }

    fn signup_workflow() -> WorkflowDefinition {
        WorkflowDefinition {
            id: "wf-signup".to_string(),
            name: "collect an email address".to_string(),
            entry_point: "slots".to_string(),
            nodes: vec![
                WorkflowNode {
                    id: "slots".to_string(),
                    node_type: slot_tracker::NODE_TYPE.to_string(),
                    config: json!({
                        "slots": [
                            {"key": "email", "prompt": "What's your email?", "required": true},
                        ],
                    }),
                },
                WorkflowNode {
                    id: "stream".to_string(),
                    node_type: stream_to_client::NODE_TYPE.to_string(),
                    config: json!({}),
                },
            ],
            edges: vec![WorkflowEdge {
                id: "e1".to_string(),
                from: "slots".to_string(),
                to: "stream".to_string(),
            }],
        }
    }

    async fn signup_context() -> (InvocationContext, Arc<InMemoryProgressStore>, Arc<InMemoryCheckpointSaver>) {
        let progress_store = Arc::new(InMemoryProgressStore::new());
        let progress = Arc::new(DualWriteProgressSink::new(progress_store.clone()));
        let checkpoint_saver = Arc::new(InMemoryCheckpointSaver::new());
        let workflows = Arc::new(InMemoryWorkflowStore::new());
        workflows.put(signup_workflow()).await;

        let ctx = InvocationContext::new(
            ProcessConfig::default(),
            ctx_dispatch(),
            progress,
            checkpoint_saver.clone(),
            workflows,
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(InMemoryVectorIndex::new()),
        );
        (ctx, progress_store, checkpoint_saver)
    }

    #[tokio::test]
    async fn missing_required_slot_suspends_the_invocation() {
        let (ctx, progress_store, saver) = signup_context().await;

        let request = InvocationRequest {
            workflow_id: "wf-signup".to_string(),
            user_id: "user-1".to_string(),
            conversation_id: "conv-4".to_string(),
            user_prompt: "I want to sign up".to_string(),
            allowed_document_ids: Vec::new(),
        };
        let ack = ctx.accept(request).await.unwrap();
        assert!(ack.suspended);

        let rows = progress_store.rows().await;
        assert!(rows.iter().any(|r| matches!(
            r.event.kind,
            langgraph_core::progress::ProgressEventKind::AwaitingInput
        ) && r
            .event
            .payload
            .as_ref()
            .and_then(|p| p.get("slotKey"))
            .and_then(Value::as_str)
            == Some("email")));

        let saver_dyn: Arc<dyn CheckpointSaver> = saver;
        let snapshot = langgraph_core::persistence::load_state(&saver_dyn, "conv-4").await.unwrap().unwrap();
        assert_eq!(snapshot[fields::CURRENT_NODE_ID], json!("slots"));
    }

    #[tokio::test]
    async fn answering_the_awaited_slot_resumes_past_the_slot_tracker() {
        let (ctx, progress_store, saver) = signup_context().await;

        let first = InvocationRequest {
            workflow_id: "wf-signup".to_string(),
            user_id: "user-1".to_string(),
            conversation_id: "conv-5".to_string(),
            user_prompt: "I want to sign up".to_string(),
            allowed_document_ids: Vec::new(),
        };
        let first_ack = ctx.accept(first).await.unwrap();
        assert!(first_ack.suspended);

        let second = InvocationRequest {
            workflow_id: "wf-signup".to_string(),
            user_id: "user-1".to_string(),
            conversation_id: "conv-5".to_string(),
            user_prompt: "a@b.co".to_string(),
            allowed_document_ids: Vec::new(),
        };
        let second_ack = ctx.accept(second).await.unwrap();
        assert!(!second_ack.suspended);

        let rows = progress_store.rows().await;
        assert!(rows
            .iter()
            .any(|r| r.event.node_id == "stream" && matches!(r.event.kind, langgraph_core::progress::ProgressEventKind::Completed)));

        let saver_dyn: Arc<dyn CheckpointSaver> = saver;
        let snapshot = langgraph_core::persistence::load_state(&saver_dyn, "conv-5").await.unwrap().unwrap();
        assert_eq!(snapshot[fields::ALL_SLOTS_FILLED], json!(true));
        assert_eq!(snapshot[fields::SLOT_VALUES]["email"], json!("a@b.co"));
    }

    fn ctx_dispatch() -> Arc<ModelProviderDispatch> {
        let registry = Arc::new(ModelRegistry::new(vec![stub_capability()], "stub-model").unwrap());
        let mut dispatch = ModelProviderDispatch::new(registry);
        dispatch.register("stub-model", Arc::new(StubModel("hi there".to_string())));
        Arc::new(dispatch)
    }

    #[tokio::test]
    async fn router_picks_highest_priority_matching_route_over_the_executor() {
        let mut node_registry = NodeRegistry::new();
        node_registry.register(router::NODE_TYPE, Arc::new(RouterNode::new()));
        node_registry.register(
            stream_to_client::NODE_TYPE,
            Arc::new(StreamToClientNode::new(Arc::new(
                langgraph_core::progress::InMemoryProgressSink::new(),
            ))),
        );

        let workflow = WorkflowDefinition {
            id: "wf-route".to_string(),
            name: "route by intent".to_string(),
            entry_point: "router".to_string(),
            nodes: vec![
                WorkflowNode {
                    id: "router".to_string(),
                    node_type: router::NODE_TYPE.to_string(),
                    config: json!({
                        "routes": [
                            {"condition": "intent == \"refund\"", "target": "refund_node", "priority": 10},
                            {"condition": "intent == \"greeting\"", "target": "greeting_node", "priority": 5},
                        ],
                    }),
                },
                WorkflowNode {
                    id: "refund_node".to_string(),
                    node_type: stream_to_client::NODE_TYPE.to_string(),
                    config: json!({}),
                },
                WorkflowNode {
                    id: "greeting_node".to_string(),
                    node_type: stream_to_client::NODE_TYPE.to_string(),
                    config: json!({}),
                },
            ],
            edges: vec![],
        };

        let progress = Arc::new(langgraph_core::progress::InMemoryProgressSink::new());
        let executor = GraphExecutor::new(node_registry, progress);
        let schema = execution_state::canonical_schema();
        let state = execution_state::merge(&schema, &json!({}), &json!({"intent": "refund"})).unwrap();

        let outcome = executor.run(&workflow, "conv-6", "inv-6", state).await.unwrap();
        let final_state = match outcome {
            ExecutorOutcome::Completed(state) => state,
            ExecutorOutcome::Suspended(_) => panic!("routing workflow should complete, not suspend"),
        };
        assert_eq!(final_state[fields::ROUTE_CHOSEN], json!("refund_node"));
        assert_eq!(
            final_state[fields::ROUTING_REASON],
            json!("matched condition 'intent == \"refund\"', routed to 'refund_node'")
        );
    }

    #[tokio::test]
    async fn budget_refusal_stops_the_call_before_it_reaches_the_provider() {
        let registry = Arc::new(
            ModelRegistry::new(
                vec![ModelCapability {
                    id: "expensive-model".to_string(),
                    provider: "stub".to_string(),
                    context_window: 8000,
                    modalities: vec![Modality::Text],
                    parameter_specs: Vec::new(),
                    api_conventions: serde_json::Map::new(),
                    tokenizer: TokenizerSpec {
                        mode: TokenizerMode::Estimate,
                        chars_per_token: 4.0,
                        overhead: 0,
                    },
                    reserved_output_tokens: 500,
                    pricing: Pricing {
                        input_cost_per_unit: 1_000.0,
                        output_cost_per_unit: 1_000.0,
                    },
                    api_model_ids: ApiModelIds {
                        on_demand: Some("expensive-model".to_string()),
                        serverless: None,
                        default_inference_type: InferenceType::OnDemand,
                    },
                    flags: Vec::new(),
                }],
                "expensive-model",
            )
            .unwrap(),
        );
        let mut dispatch = ModelProviderDispatch::new(registry);
        dispatch.register("expensive-model", Arc::new(StubModel("should not be reached".to_string())));

        let progress_store = Arc::new(InMemoryProgressStore::new());
        let progress = Arc::new(DualWriteProgressSink::new(progress_store.clone()));
        let checkpoint_saver = Arc::new(InMemoryCheckpointSaver::new());
        let workflows = Arc::new(InMemoryWorkflowStore::new());
        let mut workflow = single_shot_workflow();
        workflow.id = "wf-expensive".to_string();
        workflow.nodes[1].config = json!({"modelId": "expensive-model"});
        workflows.put(workflow).await;

        let mut process_config = ProcessConfig::default();
        process_config.request_cost_cap_usd = 0.01;
        process_config.emergency_cost_threshold_usd = 0.01;

        let ctx = InvocationContext::new(
            process_config,
            Arc::new(dispatch),
            progress,
            checkpoint_saver,
            workflows,
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(InMemoryVectorIndex::new()),
        );

        let request = InvocationRequest {
            workflow_id: "wf-expensive".to_string(),
            user_id: "user-1".to_string(),
            conversation_id: "conv-7".to_string(),
            user_prompt: "Hello".to_string(),
            allowed_document_ids: Vec::new(),
        };
        let err = ctx.accept(request).await.unwrap_err();
        assert!(matches!(err, GraphError::Budget(_)));

        let rows = progress_store.rows().await;
        assert!(rows.iter().any(|r| {
            matches!(r.event.kind, langgraph_core::progress::ProgressEventKind::Error)
                && r.event.payload.as_ref().and_then(|p| p.get("code")).and_then(Value::as_str) == Some("BUDGET_EXCEEDED")
        }));
    }
}
