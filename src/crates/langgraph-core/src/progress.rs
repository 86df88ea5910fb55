//! Progress events: the append-only, dual-written record of invocation activity.
//!
//! Mirrors the shape of [`crate::stream::StreamEvent`] but targets external
//! observers (the conversation's owners) rather than the in-process
//! `compiled::stream` API.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// The kind of activity a [`ProgressEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressEventKind {
    Started,
    Streaming,
    AwaitingInput,
    Completed,
    Error,
}

/// One row of the progress record, written once per owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub conversation_id: String,
    pub invocation_id: String,
    pub seq: u64,
    pub owners: Vec<String>,
    pub node_id: String,
    pub kind: ProgressEventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub timestamp_ms: i64,
}

/// Assigns monotonically increasing sequence numbers per `(conversationId, invocationId)`.
///
/// Shared by any [`ProgressSink`] implementation that needs the ordering
/// guarantee from the Progress Channel contract (seq strictly increasing
/// per invocation).
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    counters: Mutex<HashMap<(String, String), Arc<AtomicU64>>>,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next sequence number for this conversation/invocation pair, starting at 0.
    pub async fn next(&self, conversation_id: &str, invocation_id: &str) -> u64 {
        let key = (conversation_id.to_string(), invocation_id.to_string());
        let counter = {
            let mut counters = self.counters.lock().await;
            counters
                .entry(key)
                .or_insert_with(|| Arc::new(AtomicU64::new(0)))
                .clone()
        };
        counter.fetch_add(1, Ordering::SeqCst)
    }
}

/// The Progress Channel contract: `emit(conversationId, invocationId, nodeId, kind, payload?)`.
///
/// Implementations own seq assignment, owner-set resolution, and dual-write
/// fan-out to the external store; write failures must never propagate as a
/// fatal error to the executor (see the error taxonomy's "Progress write
/// errors" kind).
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn emit(
        &self,
        conversation_id: &str,
        invocation_id: &str,
        node_id: &str,
        kind: ProgressEventKind,
        payload: Option<Value>,
    ) -> Result<()>;
}

/// A [`ProgressSink`] that records events in memory; used in tests and as a
/// reference implementation for the dual-write fan-out.
#[derive(Debug, Default)]
pub struct InMemoryProgressSink {
    allocator: SequenceAllocator,
    events: Mutex<Vec<ProgressEvent>>,
}

impl InMemoryProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl ProgressSink for InMemoryProgressSink {
    async fn emit(
        &self,
        conversation_id: &str,
        invocation_id: &str,
        node_id: &str,
        kind: ProgressEventKind,
        payload: Option<Value>,
    ) -> Result<()> {
        let seq = self.allocator.next(conversation_id, invocation_id).await;
        let event = ProgressEvent {
            conversation_id: conversation_id.to_string(),
            invocation_id: invocation_id.to_string(),
            seq,
            owners: vec![],
            node_id: node_id.to_string(),
            kind,
            payload,
            timestamp_ms: 0,
        };
        self.events.lock().await.push(event);
        Ok(())
    }
}
