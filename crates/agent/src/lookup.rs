//! Knowledge lookup: substring search over ingested documents, trimmed to
//! excerpt windows around the match.

use serde::{Deserialize, Serialize};
use solverbot_core::error::StorageError;
use solverbot_core::memory::{DEFAULT_MAX_RESULTS, KnowledgeStore};
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_EXCERPT_RADIUS: usize = 400;

/// A bounded excerpt of a knowledge unit around a query match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeFragment {
    pub document_id: String,
    /// Character offset of the first match within the unit.
    pub offset: usize,
    pub excerpt: String,
}

pub struct KnowledgeLookup {
    store: Arc<dyn KnowledgeStore>,
    max_results: usize,
    excerpt_radius: usize,
}

impl KnowledgeLookup {
    pub fn new(store: Arc<dyn KnowledgeStore>) -> Self {
        Self {
            store,
            max_results: DEFAULT_MAX_RESULTS,
            excerpt_radius: DEFAULT_EXCERPT_RADIUS,
        }
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    /// Characters kept on each side of the match.
    pub fn with_excerpt_radius(mut self, radius: usize) -> Self {
        self.excerpt_radius = radius;
        self
    }

    /// Fragments of `document_id` containing `query`, in ingestion order.
    pub async fn search(
        &self,
        document_id: &str,
        query: &str,
    ) -> Result<Vec<KnowledgeFragment>, StorageError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }

        let units = self
            .store
            .search(document_id, query, self.max_results)
            .await?;

        debug!(document_id, matches = units.len(), "Knowledge lookup");

        Ok(units
            .into_iter()
            .map(|unit| {
                let (offset, excerpt) = excerpt(&unit.content, query, self.excerpt_radius);
                KnowledgeFragment {
                    document_id: unit.document_id,
                    offset,
                    excerpt,
                }
            })
            .collect())
    }
}

/// Byte index of the first case-insensitive occurrence of `needle`.
fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let needle: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if needle.is_empty() {
        return None;
    }

    haystack.char_indices().map(|(i, _)| i).find(|&i| {
        let mut hay = haystack[i..].chars().flat_map(char::to_lowercase);
        needle.iter().all(|n| hay.next() == Some(*n))
    })
}

/// Cut a window of `radius` characters either side of the first match.
///
/// Returns the match's character offset and the excerpt. Cuts fall on char
/// boundaries; `...` marks a trimmed side. When the match cannot be located
/// character-by-character, the window starts at the beginning of the text.
pub fn excerpt(content: &str, query: &str, radius: usize) -> (usize, String) {
    let (offset, match_len) = match find_ignore_case(content, query) {
        Some(byte_idx) => (content[..byte_idx].chars().count(), query.chars().count()),
        None => (0, 0),
    };

    let total = content.chars().count();
    let start = offset.saturating_sub(radius);
    let end = (offset + match_len + radius).min(total);

    let window: String = content.chars().skip(start).take(end - start).collect();

    let mut out = String::with_capacity(window.len() + 6);
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(window.trim());
    if end < total {
        out.push_str("...");
    }
    (offset, out)
}

/// Fold fragments into the text of one system message.
pub fn format_fragments(fragments: &[KnowledgeFragment]) -> String {
    let mut out = String::from(
        "Reference material from the uploaded document that may help answer the next question:",
    );
    for (i, fragment) in fragments.iter().enumerate() {
        out.push_str(&format!("\n\n[{}] {}", i + 1, fragment.excerpt));
    }
    out
}
