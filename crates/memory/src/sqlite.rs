//! SQLite store for conversation turns and knowledge units.
//!
//! Uses a single SQLite database file with two tables:
//! - `chat_memory`: one row per conversation turn
//! - `pdf_knowledge`: one row per ingested document
//!
//! Timestamps are stored as Unix milliseconds. Knowledge search filters in
//! Rust because SQLite's `LIKE` only folds ASCII case.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use solverbot_core::error::StorageError;
use solverbot_core::memory::{KnowledgeStore, KnowledgeUnit, TurnStore, contains_ignore_case};
use solverbot_core::message::{ConversationId, ConversationTurn, Role};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// The on-disk file behind a SQLite URL, if any.
fn database_file(url: &str) -> Option<&Path> {
    if url.contains(":memory:") {
        return None;
    }
    let path = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    Some(Path::new(path))
}

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database (useful for tests).
    pub async fn new(path: &str) -> Result<Self, StorageError> {
        if let Some(parent) = database_file(path).and_then(|f| f.parent()) {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StorageError::Connection(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StorageError::Connection(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to :memory: sees its own database.
        let max_connections = if path.contains(":memory:") { 1 } else { 4 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_memory (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id     TEXT NOT NULL,
                role        TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("chat_memory table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_chat_memory_chat ON chat_memory(chat_id, created_at DESC, id DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("chat_memory index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pdf_knowledge (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                file_id     TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Migration(format!("pdf_knowledge table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_pdf_knowledge_file ON pdf_knowledge(file_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Migration(format!("pdf_knowledge index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_turn(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationTurn, StorageError> {
        let chat_id: String = row
            .try_get("chat_id")
            .map_err(|e| StorageError::Query(format!("chat_id column: {e}")))?;
        let role: String = row
            .try_get("role")
            .map_err(|e| StorageError::Query(format!("role column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StorageError::Query(format!("content column: {e}")))?;
        let created_at: i64 = row
            .try_get("created_at")
            .map_err(|e| StorageError::Query(format!("created_at column: {e}")))?;

        Ok(ConversationTurn {
            conversation_id: ConversationId(chat_id),
            role: Role::from_str(&role).map_err(StorageError::Query)?,
            content,
            created_at: DateTime::<Utc>::from_timestamp_millis(created_at).unwrap_or_else(Utc::now),
        })
    }
}

#[async_trait]
impl TurnStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        role: Role,
        content: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO chat_memory (chat_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id.as_str())
        .bind(role.as_str())
        .bind(content)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Write(format!("Insert turn failed: {e}")))?;

        debug!(conversation = %conversation_id, %role, "Stored turn");
        Ok(())
    }

    async fn append_pair(
        &self,
        conversation_id: &ConversationId,
        user: &str,
        assistant: &str,
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Write(format!("Begin transaction failed: {e}")))?;

        let now = Utc::now().timestamp_millis();
        for (role, content) in [(Role::User, user), (Role::Assistant, assistant)] {
            sqlx::query(
                "INSERT INTO chat_memory (chat_id, role, content, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(conversation_id.as_str())
            .bind(role.as_str())
            .bind(content)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Write(format!("Insert turn failed: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Write(format!("Commit failed: {e}")))?;

        debug!(conversation = %conversation_id, "Stored turn pair");
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

        let rows = sqlx::query(
            r#"
            SELECT chat_id, role, content, created_at
            FROM chat_memory
            WHERE chat_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(conversation_id.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Query(format!("Recent turns query failed: {e}")))?;

        let mut turns = rows
            .iter()
            .map(Self::row_to_turn)
            .collect::<Result<Vec<_>, _>>()?;
        turns.reverse();
        Ok(turns)
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn insert(&self, unit: KnowledgeUnit) -> Result<(), StorageError> {
        sqlx::query("INSERT INTO pdf_knowledge (file_id, content, created_at) VALUES (?, ?, ?)")
            .bind(&unit.document_id)
            .bind(&unit.content)
            .bind(Utc::now().timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Write(format!("Insert knowledge failed: {e}")))?;

        debug!(
            document = %unit.document_id,
            chars = unit.content.chars().count(),
            "Stored knowledge unit"
        );
        Ok(())
    }

    async fn search(
        &self,
        document_id: &str,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<KnowledgeUnit>, StorageError> {
        if query.trim().is_empty() || max_results == 0 {
            return Ok(vec![]);
        }

        let rows = sqlx::query("SELECT file_id, content FROM pdf_knowledge WHERE file_id = ? ORDER BY id ASC")
            .bind(document_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Query(format!("Knowledge query failed: {e}")))?;

        let mut hits = Vec::new();
        for row in &rows {
            let content: String = row
                .try_get("content")
                .map_err(|e| StorageError::Query(format!("content column: {e}")))?;
            if !contains_ignore_case(&content, query) {
                continue;
            }
            let document_id: String = row
                .try_get("file_id")
                .map_err(|e| StorageError::Query(format!("file_id column: {e}")))?;
            hits.push(KnowledgeUnit {
                document_id,
                content,
            });
            if hits.len() == max_results {
                break;
            }
        }

        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::new("sqlite::memory:").await.unwrap()
    }

    fn unit(doc: &str, content: &str) -> KnowledgeUnit {
        KnowledgeUnit {
            document_id: doc.into(),
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn append_and_recent() {
        let db = test_store().await;
        let conv = ConversationId::from("1001");

        db.append(&conv, Role::User, "Solve x^2 = 4").await.unwrap();
        db.append(&conv, Role::Assistant, "x = ±2").await.unwrap();

        let turns = db.recent(&conv, 20).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[0].content, "Solve x^2 = 4");
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].conversation_id, conv);
    }

    #[tokio::test]
    async fn append_pair_rolls_back_when_the_answer_is_rejected() {
        let db = test_store().await;
        let conv = ConversationId::from("1001");
        sqlx::query(
            r#"
            CREATE TRIGGER reject_answer BEFORE INSERT ON chat_memory
            WHEN NEW.role = 'assistant' AND NEW.content = 'rejected'
            BEGIN SELECT RAISE(ABORT, 'answer rejected'); END
            "#,
        )
        .execute(&db.pool)
        .await
        .unwrap();

        let err = db.append_pair(&conv, "2+2?", "rejected").await.unwrap_err();
        assert!(matches!(err, StorageError::Write(_)));
        assert!(db.recent(&conv, 20).await.unwrap().is_empty());

        db.append_pair(&conv, "2+2?", "4").await.unwrap();
        let turns = db.recent(&conv, 20).await.unwrap();
        let log: Vec<(Role, &str)> = turns.iter().map(|t| (t.role, t.content.as_str())).collect();
        assert_eq!(log, vec![(Role::User, "2+2?"), (Role::Assistant, "4")]);
    }

    #[tokio::test]
    async fn recent_returns_newest_window_oldest_first() {
        let db = test_store().await;
        let conv = ConversationId::from("1001");
        // Many inserts share a millisecond; the id tie-break keeps order.
        for i in 0..30 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            db.append(&conv, role, &format!("turn {i}")).await.unwrap();
        }

        let turns = db.recent(&conv, 20).await.unwrap();
        assert_eq!(turns.len(), 20);
        assert_eq!(turns[0].content, "turn 10");
        assert_eq!(turns[19].content, "turn 29");
    }

    #[tokio::test]
    async fn recent_is_scoped_to_conversation() {
        let db = test_store().await;
        db.append(&ConversationId::from("a"), Role::User, "alpha")
            .await
            .unwrap();
        db.append(&ConversationId::from("b"), Role::User, "beta")
            .await
            .unwrap();

        let turns = db.recent(&ConversationId::from("a"), 20).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "alpha");
    }

    #[tokio::test]
    async fn recent_with_zero_limit_is_rejected() {
        let db = test_store().await;
        assert!(matches!(
            db.recent(&ConversationId::from("a"), 0).await,
            Err(StorageError::InvalidLimit(0))
        ));
    }

    #[tokio::test]
    async fn search_folds_unicode_case() {
        let db = test_store().await;
        db.insert(unit("file-1", "Закон Ома: U = IR")).await.unwrap();

        let hits = db.search("file-1", "ома", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "file-1");
    }

    #[tokio::test]
    async fn search_scoped_ordered_and_capped() {
        let db = test_store().await;
        for i in 0..6 {
            db.insert(unit("file-1", &format!("part {i} about Entropy")))
                .await
                .unwrap();
        }
        db.insert(unit("file-2", "entropy elsewhere")).await.unwrap();

        let hits = db.search("file-1", "entropy", 5).await.unwrap();
        assert_eq!(hits.len(), 5);
        assert!(hits.iter().all(|h| h.document_id == "file-1"));
        assert!(hits[0].content.starts_with("part 0"));
    }

    #[tokio::test]
    async fn empty_content_is_storable_but_never_matches() {
        let db = test_store().await;
        db.insert(unit("scan", "")).await.unwrap();

        assert!(db.search("scan", "a", 5).await.unwrap().is_empty());
        assert!(db.search("scan", "", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("sqlite://{}", dir.path().join("bot.sqlite").display());

        {
            let db = SqliteStore::new(&path).await.unwrap();
            db.append(&ConversationId::from("7"), Role::User, "remember me")
                .await
                .unwrap();
        }

        let db = SqliteStore::new(&path).await.unwrap();
        let turns = db.recent(&ConversationId::from("7"), 5).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "remember me");
    }

    #[tokio::test]
    async fn creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("nested").join("deeper").join("bot.sqlite");

        SqliteStore::new(&format!("sqlite://{}", file.display()))
            .await
            .unwrap();
        assert!(file.exists());
    }

    #[test]
    fn database_file_from_urls() {
        assert_eq!(
            database_file("sqlite:///var/lib/bot.sqlite?mode=rwc"),
            Some(Path::new("/var/lib/bot.sqlite"))
        );
        assert_eq!(database_file("sqlite:bot.sqlite"), Some(Path::new("bot.sqlite")));
        assert_eq!(database_file("sqlite::memory:"), None);
    }
}
