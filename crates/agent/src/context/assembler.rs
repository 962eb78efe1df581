//! Context assembly: the ordered message sequence for one reasoning call.
//!
//! Layout of a normal (non-priming) build:
//!
//! 1. **System**: the configured directive
//! 2. **History**: recent turns of this conversation, oldest first, roles kept
//! 3. **Knowledge**: one extra system message with matching fragments, only
//!    when a document is in scope and the lookup found something
//! 4. **User**: the current question
//!
//! A priming build (the turn right after a document upload) uses the user's
//! text as the system directive, replays history, and adds nothing else. It
//! must not be sent to the model.

use crate::lookup::{KnowledgeLookup, format_fragments};
use crate::state::ConversationState;
use solverbot_core::error::StorageError;
use solverbot_core::memory::{DEFAULT_HISTORY_LIMIT, TurnStore};
use solverbot_core::message::{ConversationId, Message, Role};
use std::sync::Arc;
use tracing::{debug, warn};

/// The assembled context, ready for a reasoning call.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledContext {
    pub messages: Vec<Message>,
    /// This build consumed the priming flag; do not forward it to the model.
    pub priming: bool,
    /// Number of knowledge fragments folded in.
    pub fragments: usize,
}

impl AssembledContext {
    /// The leading system directive.
    pub fn system_directive(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }
}

pub struct ContextAssembler {
    turns: Arc<dyn TurnStore>,
    lookup: KnowledgeLookup,
    system_prompt: String,
    history_limit: usize,
}

impl ContextAssembler {
    pub fn new(
        turns: Arc<dyn TurnStore>,
        lookup: KnowledgeLookup,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            turns,
            lookup,
            system_prompt: system_prompt.into(),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Build the message sequence for `user_text`.
    ///
    /// Returns the context and the state to store back: the priming flag is
    /// always cleared, the document scope is kept. History replay failures
    /// abort the build; lookup failures only drop the knowledge layer.
    pub async fn build(
        &self,
        conversation_id: &ConversationId,
        user_text: &str,
        state: &ConversationState,
    ) -> Result<(AssembledContext, ConversationState), StorageError> {
        let priming = state.awaiting_system_priming;
        let history = self.turns.recent(conversation_id, self.history_limit).await?;

        let mut messages = Vec::with_capacity(history.len() + 3);
        messages.push(Message::system(if priming {
            user_text
        } else {
            self.system_prompt.as_str()
        }));
        messages.extend(history.iter().map(Message::from));

        let mut fragments = 0;
        if !priming {
            if let Some(document_id) = &state.active_document_id {
                match self.lookup.search(document_id, user_text).await {
                    Ok(found) if !found.is_empty() => {
                        fragments = found.len();
                        messages.push(Message::system(format_fragments(&found)));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(
                            conversation_id = %conversation_id,
                            document_id = %document_id,
                            error = %e,
                            "Knowledge lookup failed; continuing without it"
                        );
                    }
                }
            }
            messages.push(Message::user(user_text));
        }

        debug!(
            conversation_id = %conversation_id,
            history = history.len(),
            fragments,
            priming,
            "Context assembled"
        );

        Ok((
            AssembledContext {
                messages,
                priming,
                fragments,
            },
            state.consumed(),
        ))
    }
}
