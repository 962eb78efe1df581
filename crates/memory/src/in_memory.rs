//! In-memory store — useful for testing and ephemeral sessions.

use async_trait::async_trait;
use chrono::Utc;
use solverbot_core::error::StorageError;
use solverbot_core::memory::{KnowledgeStore, KnowledgeUnit, TurnStore, contains_ignore_case};
use solverbot_core::message::{ConversationId, ConversationTurn, Role};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Keeps turns and knowledge units in insertion-ordered Vecs.
/// Nothing survives a restart.
pub struct InMemoryStore {
    turns: Arc<RwLock<Vec<ConversationTurn>>>,
    knowledge: Arc<RwLock<Vec<KnowledgeUnit>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            turns: Arc::new(RwLock::new(Vec::new())),
            knowledge: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Total number of stored turns across all conversations.
    pub async fn turn_count(&self) -> usize {
        self.turns.read().await.len()
    }

    /// Total number of stored knowledge units.
    pub async fn knowledge_count(&self) -> usize {
        self.knowledge.read().await.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TurnStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        content: &str,
    ) -> Result<(), StorageError> {
        self.turns.write().await.push(ConversationTurn {
            conversation_id: conversation_id.clone(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn append_pair(
        &self,
        conversation_id: &ConversationId,
        user: &str,
        assistant: &str,
    ) -> Result<(), StorageError> {
        let now = Utc::now();
        let mut turns = self.turns.write().await;
        for (role, content) in [(Role::User, user), (Role::Assistant, assistant)] {
            turns.push(ConversationTurn {
                conversation_id: conversation_id.clone(),
                role,
                content: content.to_string(),
                created_at: now,
            });
        }
        Ok(())
    }

    async fn recent(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, StorageError> {
        if limit == 0 {
            return Err(StorageError::InvalidLimit(limit));
        }

        let turns = self.turns.read().await;
        let mut recent: Vec<ConversationTurn> = turns
            .iter()
            .rev()
            .filter(|t| &t.conversation_id == conversation_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn insert(&self, unit: KnowledgeUnit) -> Result<(), StorageError> {
        self.knowledge.write().await.push(unit);
        Ok(())
    }

    async fn search(
        &self,
        document_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<KnowledgeUnit>, StorageError> {
        if query.trim().is_empty() {
            return Ok(vec![]);
        }

        let knowledge = self.knowledge.read().await;
        Ok(knowledge
            .iter()
            .filter(|u| u.document_id == document_id && contains_ignore_case(&u.content, query))
            .take(max_results)
            .cloned()
            .collect())
    }
}
