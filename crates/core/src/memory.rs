//! Storage traits: the conversation turn log and the knowledge base.
//!
//! The storage contract has these operations split over two traits:
//! - [`TurnStore::append`] / [`TurnStore::recent`]: per-conversation memory
//!   ([`TurnStore::append_pair`] writes a question and its answer together)
//! - [`KnowledgeStore::insert`] / [`KnowledgeStore::search`]: uploaded reference text
//!
//! Backends (SQLite, PostgreSQL, in-memory) usually implement both.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::message::{ConversationId, ConversationTurn, Role};

/// Default number of turns replayed into a prompt.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Default number of knowledge matches returned by a search.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Text extracted from one uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeUnit {
    pub document_id: String,
    /// Full extracted text; may be empty.
    pub content: String,
}

/// Append-only log of conversation turns.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// The backend name (e.g., "sqlite", "postgres", "in_memory").
    fn name(&self) -> &str;

    /// Persist one turn. The timestamp is assigned by the store.
    async fn append(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        content: &str,
    ) -> std::result::Result<(), StorageError>;

    /// Persist a `(user, assistant)` exchange atomically: either both turns
    /// are stored, user first, or neither is.
    async fn append_pair(
        &self,
        conversation_id: &ConversationId,
        user: &str,
        assistant: &str,
    ) -> std::result::Result<(), StorageError>;

    /// Up to `limit` most recent turns, oldest first.
    ///
    /// `limit == 0` is rejected with [`StorageError::InvalidLimit`].
    async fn recent(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> std::result::Result<Vec<ConversationTurn>, StorageError>;
}

/// Store of uploaded reference material.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Persist one knowledge unit. Empty content is valid.
    async fn insert(&self, unit: KnowledgeUnit) -> std::result::Result<(), StorageError>;

    /// Units for `document_id` whose content contains `query`, ignoring case.
    ///
    /// Results come back in ingestion order, at most `max_results` of them.
    /// A blank query matches nothing.
    async fn search(
        &self,
        document_id: &str,
        query: &str,
        max_results: usize,
    ) -> std::result::Result<Vec<KnowledgeUnit>, StorageError>;
}

/// Case-insensitive substring test shared by backends that filter in Rust.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
