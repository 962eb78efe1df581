//! Storage implementations for SolverBot.
//!
//! Every backend implements both [`TurnStore`] and [`KnowledgeStore`];
//! [`open`] picks one by name and hands back both views of it.

use std::sync::Arc;

use solverbot_core::error::StorageError;
use solverbot_core::memory::{KnowledgeStore, TurnStore};

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;

/// The two storage views, usually backed by the same store.
#[derive(Clone)]
pub struct Stores {
    pub turns: Arc<dyn TurnStore>,
    pub knowledge: Arc<dyn KnowledgeStore>,
}

impl Stores {
    /// Share one backend between both views.
    pub fn shared<S>(store: S) -> Self
    where
        S: TurnStore + KnowledgeStore + 'static,
    {
        let store = Arc::new(store);
        Self {
            turns: store.clone(),
            knowledge: store,
        }
    }
}

/// Open the named backend ("sqlite", "postgres" or "in_memory").
///
/// Schema migrations run as part of opening.
pub async fn open(backend: &str, database_url: &str) -> Result<Stores, StorageError> {
    match backend {
        "in_memory" => Ok(Stores::shared(InMemoryStore::new())),

        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Stores::shared(SqliteStore::new(database_url).await?)),

        #[cfg(feature = "postgres")]
        "postgres" => Ok(Stores::shared(PostgresStore::connect(database_url).await?)),

        other => {
            let _ = database_url;
            Err(StorageError::Connection(format!(
                "storage backend '{other}' is not available in this build"
            )))
        }
    }
}
