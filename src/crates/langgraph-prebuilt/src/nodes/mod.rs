//! The eight node kinds a workflow definition can reference by `type`.

pub mod conversation_memory;
pub mod format;
pub mod intent_classifier;
pub mod model_invoke;
pub mod router;
pub mod slot_tracker;
pub mod stream_to_client;
pub mod vector_search;
pub mod vector_write;

pub use conversation_memory::ConversationMemoryNode;
pub use format::FormatNode;
pub use intent_classifier::IntentClassifierNode;
pub use model_invoke::ModelInvokeNode;
pub use router::RouterNode;
pub use slot_tracker::SlotTrackerNode;
pub use stream_to_client::StreamToClientNode;
pub use vector_search::VectorSearchNode;
pub use vector_write::VectorWriteNode;
