//! The real Progress Channel: dual-write fan-out of progress events to an
//! external store, one row per owner, with bounded retry on transient write
//! failures. Implements [`langgraph_core::progress::ProgressSink`]; see
//! [`InMemoryProgressSink`](langgraph_core::progress::InMemoryProgressSink)
//! for the reference sink this generalizes.
//!
//! `ProgressSink::emit` doesn't carry the invocation's state, so the owner
//! set (`state.ownersForProgress ∪ {userId}`) is registered separately via
//! [`DualWriteProgressSink::set_owners`] before the executor runs for a given
//! conversation, and reused for every event that invocation emits.

use async_trait::async_trait;
use dashmap::DashMap;
use langgraph_core::error::Result;
use langgraph_core::progress::{ProgressEvent, ProgressEventKind, ProgressSink, SequenceAllocator};
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tooling::async_utils::retry::{with_retry, RetryPolicy};

/// One written row: a progress event addressed to a single owner.
#[derive(Debug, Clone)]
pub struct ProgressRow {
    pub owner: String,
    pub event: ProgressEvent,
}

/// Where dual-written progress rows ultimately land. Implementations need
/// only preserve per-`(conversation_id, invocation_id)` ordering; batching
/// writes across owners is fine.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn write_row(&self, row: ProgressRow) -> std::result::Result<(), String>;
}

/// An in-process [`ProgressStore`] for tests and small deployments.
#[derive(Debug, Default)]
pub struct InMemoryProgressStore {
    rows: tokio::sync::Mutex<Vec<ProgressRow>>,
}

impl InMemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn rows(&self) -> Vec<ProgressRow> {
        self.rows.lock().await.clone()
    }
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn write_row(&self, row: ProgressRow) -> std::result::Result<(), String> {
        self.rows.lock().await.push(row);
        Ok(())
    }
}

/// Max attempts (including the first) for a single owner's row write.
pub const WRITE_RETRY_ATTEMPTS: usize = 3;

/// Dual-write [`ProgressSink`]: assigns seq, resolves the registered owner
/// set, and writes one row per owner to a [`ProgressStore`] with bounded
/// retry. A write that exhausts its retries is logged and dropped; progress
/// loss is never surfaced as an executor-fatal error.
pub struct DualWriteProgressSink {
    store: Arc<dyn ProgressStore>,
    allocator: SequenceAllocator,
    owners: DashMap<String, Vec<String>>,
    retry_policy: RetryPolicy,
}

impl DualWriteProgressSink {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self {
            store,
            allocator: SequenceAllocator::new(),
            owners: DashMap::new(),
            retry_policy: RetryPolicy::new(WRITE_RETRY_ATTEMPTS),
        }
    }

    /// Registers `ownersForProgress ∪ {userId}` for `conversation_id` ahead
    /// of an invocation. Every event the invocation emits fans out to this
    /// set.
    pub fn set_owners(&self, conversation_id: &str, user_id: &str, owners_for_progress: &[String]) {
        let mut owners: Vec<String> = owners_for_progress.to_vec();
        if !owners.iter().any(|o| o == user_id) {
            owners.push(user_id.to_string());
        }
        self.owners.insert(conversation_id.to_string(), owners);
    }

    fn owners_for(&self, conversation_id: &str) -> Vec<String> {
        self.owners
            .get(conversation_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[async_trait]
impl ProgressSink for DualWriteProgressSink {
    async fn emit(
        &self,
        conversation_id: &str,
        invocation_id: &str,
        node_id: &str,
        kind: ProgressEventKind,
        payload: Option<Value>,
    ) -> Result<()> {
        let seq = self.allocator.next(conversation_id, invocation_id).await;
        let owners = self.owners_for(conversation_id);
        let event = ProgressEvent {
            conversation_id: conversation_id.to_string(),
            invocation_id: invocation_id.to_string(),
            seq,
            owners: owners.clone(),
            node_id: node_id.to_string(),
            kind,
            payload,
            timestamp_ms: now_ms(),
        };

        for owner in owners {
            let row = ProgressRow {
                owner: owner.clone(),
                event: event.clone(),
            };
            let store = self.store.clone();
            let outcome = with_retry(&self.retry_policy, || {
                let store = store.clone();
                let row = row.clone();
                async move { store.write_row(row).await }
            })
            .await;

            if let Err(e) = outcome {
                tracing::warn!(
                    owner = %owner, conversation_id, invocation_id, error = %e,
                    "progress write exhausted retries, dropping row"
                );
            }
        }

        Ok(())
    }
}
