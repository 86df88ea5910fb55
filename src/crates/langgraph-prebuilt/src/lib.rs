//! # langgraph-prebuilt
//!
//! Ready-to-use graph nodes for the declarative workflow model in
//! `langgraph-core`: each node type a `WorkflowDefinition` can reference by
//! `type` has a corresponding [`NodeRunner`](langgraph_core::node::NodeRunner)
//! implementation here, plus the storage traits those nodes depend on.
//!
//! # Node kinds
//!
//! - [`ConversationMemoryNode`] - loads and appends conversation turns
//! - [`FormatNode`] - shapes a model response into the output format
//! - [`IntentClassifierNode`] - classifies user input into a configured intent set
//! - [`ModelInvokeNode`] - builds a prompt, checks budget, calls the model
//! - [`RouterNode`] - evaluates predicate-based routes, writes `__routeChosen`
//! - [`SlotTrackerNode`] - fills declared slots, suspending when one is missing
//! - [`StreamToClientNode`] - terminal node, emits the final progress event
//! - [`VectorSearchNode`] / [`VectorWriteNode`] - retrieval-augmented context
//!
//! # Stores
//!
//! [`ConversationStore`], [`VectorIndex`] and [`WorkflowStore`] are the
//! storage seams these nodes and the invocation entrypoint depend on; each
//! has an in-memory implementation here for tests and local development.

pub mod nodes;
pub mod stores;

pub use nodes::{
    ConversationMemoryNode, FormatNode, IntentClassifierNode, ModelInvokeNode, RouterNode,
    SlotTrackerNode, StreamToClientNode, VectorSearchNode, VectorWriteNode,
};
pub use stores::{
    ConversationStore, InMemoryConversationStore, InMemoryVectorIndex, InMemoryWorkflowStore,
    MemoryTurn, SharedConversationStore, SharedVectorIndex, SharedWorkflowStore, VectorDocument,
    VectorIndex, WorkflowStore,
};
