//! Storage abstractions the node library depends on: conversation
//! transcripts and vector search. Production deployments back these with a
//! real database or vector index; the in-memory implementations here exist
//! for tests and local development, mirroring the in-memory reference sinks
//! in `langgraph-core`'s progress and checkpoint modules.

use async_trait::async_trait;
use langgraph_core::workflow::WorkflowDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// One turn of conversation history, as persisted/loaded by `ConversationMemory`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTurn {
    pub role: String,
    pub content: String,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Most recent `limit` turns for `conversation_id`, oldest first.
    async fn load(&self, conversation_id: &str, limit: usize) -> Vec<MemoryTurn>;

    async fn append(&self, conversation_id: &str, turns: Vec<MemoryTurn>);
}

#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    turns: Mutex<HashMap<String, Vec<MemoryTurn>>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, conversation_id: &str, limit: usize) -> Vec<MemoryTurn> {
        let turns = self.turns.lock().await;
        match turns.get(conversation_id) {
            Some(all) => {
                let start = all.len().saturating_sub(limit);
                all[start..].to_vec()
            }
            None => Vec::new(),
        }
    }

    async fn append(&self, conversation_id: &str, new_turns: Vec<MemoryTurn>) {
        let mut turns = self.turns.lock().await;
        turns.entry(conversation_id.to_string()).or_default().extend(new_turns);
    }
}

/// A single indexed document, as written by `VectorWrite` and matched by `VectorSearch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDocument {
    pub document_id: String,
    pub text: String,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, query: &str, allowed_document_ids: &[String], result_count: usize) -> Vec<VectorDocument>;

    async fn write(&self, document: VectorDocument);
}

/// Naive substring-match index. Good enough for tests; a real deployment
/// swaps this for an embedding-backed index behind the same trait.
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    documents: Mutex<Vec<VectorDocument>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn query(&self, query: &str, allowed_document_ids: &[String], result_count: usize) -> Vec<VectorDocument> {
        let documents = self.documents.lock().await;
        let query_lower = query.to_lowercase();
        documents
            .iter()
            .filter(|d| allowed_document_ids.is_empty() || allowed_document_ids.contains(&d.document_id))
            .filter(|d| query.is_empty() || d.text.to_lowercase().contains(&query_lower))
            .take(result_count)
            .cloned()
            .collect()
    }

    async fn write(&self, document: VectorDocument) {
        let mut documents = self.documents.lock().await;
        documents.push(document);
    }
}

/// Where workflow definitions live, keyed by `workflowId`. The invocation
/// entrypoint resolves the request's `workflowId` through this before
/// handing the definition to the executor.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get(&self, workflow_id: &str) -> Option<WorkflowDefinition>;
}

#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: Mutex<HashMap<String, WorkflowDefinition>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, workflow: WorkflowDefinition) {
        self.workflows.lock().await.insert(workflow.id.clone(), workflow);
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get(&self, workflow_id: &str) -> Option<WorkflowDefinition> {
        self.workflows.lock().await.get(workflow_id).cloned()
    }
}

pub type SharedConversationStore = Arc<dyn ConversationStore>;
pub type SharedVectorIndex = Arc<dyn VectorIndex>;
pub type SharedWorkflowStore = Arc<dyn WorkflowStore>;
