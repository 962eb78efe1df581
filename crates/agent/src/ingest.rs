//! Knowledge ingestion: document bytes → extracted text → knowledge store.

use solverbot_core::error::StorageError;
use solverbot_core::memory::{KnowledgeStore, KnowledgeUnit};
use std::sync::Arc;
use tracing::{info, warn};

/// Extract plain text from PDF bytes.
///
/// Extraction runs on the blocking pool. Any failure, including a panic
/// inside the extractor, yields an empty string and a warning.
pub async fn extract_text(document_id: &str, bytes: Vec<u8>) -> String {
    let size = bytes.len();
    let result = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes)).await;

    match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!(document_id, size, error = %e, "PDF text extraction failed; storing empty content");
            String::new()
        }
        Err(e) => {
            warn!(document_id, size, error = %e, "PDF extractor crashed; storing empty content");
            String::new()
        }
    }
}

pub struct Ingestor {
    store: Arc<dyn KnowledgeStore>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self { store }
    }

    /// Store already-extracted text. Empty content is valid.
    pub async fn ingest(&self, document_id: &str, content: String) -> Result<(), StorageError> {
        let chars = content.chars().count();
        self.store
            .insert(KnowledgeUnit {
                document_id: document_id.to_string(),
                content,
            })
            .await?;
        info!(document_id, chars, "Knowledge unit ingested");
        Ok(())
    }

    /// Extract text from a PDF and store it. Returns the number of characters stored.
    pub async fn ingest_pdf(&self, document_id: &str, bytes: Vec<u8>) -> Result<usize, StorageError> {
        let content = extract_text(document_id, bytes).await;
        let chars = content.chars().count();
        self.ingest(document_id, content).await?;
        Ok(chars)
    }
}
