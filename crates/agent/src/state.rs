//! Per-conversation transient state.
//!
//! Lives only in process memory and is lost on restart. Each conversation
//! gets its own async mutex; holding it for a whole turn serializes turns
//! within that conversation while other conversations proceed.

use serde::{Deserialize, Serialize};
use solverbot_core::message::ConversationId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Most recently ingested document for this conversation.
    pub active_document_id: Option<String>,
    /// The next text turn becomes the system directive instead of a question.
    pub awaiting_system_priming: bool,
}

impl ConversationState {
    /// State after a document has been ingested.
    pub fn after_ingest(document_id: impl Into<String>) -> Self {
        Self {
            active_document_id: Some(document_id.into()),
            awaiting_system_priming: true,
        }
    }

    /// Same document scope, priming flag consumed.
    pub fn consumed(&self) -> Self {
        Self {
            active_document_id: self.active_document_id.clone(),
            awaiting_system_priming: false,
        }
    }
}

/// Registry of conversation states keyed by conversation id.
#[derive(Default)]
pub struct ConversationStates {
    inner: Mutex<HashMap<ConversationId, Arc<AsyncMutex<ConversationState>>>>,
}

impl ConversationStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state slot for `id`, created on first use.
    pub fn slot(&self, id: &ConversationId) -> Arc<AsyncMutex<ConversationState>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(id.clone()).or_default().clone()
    }

    /// Snapshot of the current state for `id`.
    pub async fn get(&self, id: &ConversationId) -> ConversationState {
        let slot = {
            let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.get(id).cloned()
        };
        match slot {
            Some(slot) => slot.lock().await.clone(),
            None => ConversationState::default(),
        }
    }

    /// Forget the slot for `id` once it is idle and back to the default
    /// state. A slot still referenced elsewhere is kept.
    pub fn release(&self, id: &ConversationId) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let idle = map.get(id).is_some_and(|slot| {
            Arc::strong_count(slot) == 1
                && slot
                    .try_lock()
                    .is_ok_and(|state| *state == ConversationState::default())
        });
        if idle {
            map.remove(id);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
