//! Allowlist policy: sender validation for document uploads.

use solverbot_config::TelegramConfig;
use tracing::debug;

/// Result of checking a sender against the allowlist.
#[derive(Debug, Clone, PartialEq)]
pub enum SenderCheckResult {
    /// Sender is allowed
    Allowed,
    /// Sender is denied
    Denied { sender_id: String, reason: String },
}

impl SenderCheckResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, SenderCheckResult::Allowed)
    }
}

/// Decides who may upload reference documents.
pub trait UploadPolicy: Send + Sync {
    fn check_uploader(&self, sender_id: &str) -> SenderCheckResult;

    fn may_upload(&self, sender_id: &str) -> bool {
        self.check_uploader(sender_id).is_allowed()
    }
}

/// A fixed list of privileged sender ids.
///
/// Rules:
/// - If the list is empty → deny all (secure by default)
/// - If the list contains `"*"` → allow all
/// - Otherwise, the sender must be in the list
#[derive(Debug, Clone, Default)]
pub struct AllowlistPolicy {
    allowed: Vec<String>,
}

impl AllowlistPolicy {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// The uploaders listed under `[telegram]`.
    pub fn from_config(config: &TelegramConfig) -> Self {
        Self::new(config.uploaders.iter().cloned())
    }
}

impl UploadPolicy for AllowlistPolicy {
    fn check_uploader(&self, sender_id: &str) -> SenderCheckResult {
        if self.allowed.is_empty() {
            return SenderCheckResult::Denied {
                sender_id: sender_id.into(),
                reason: "No uploaders configured (deny by default)".into(),
            };
        }

        if self.allowed.iter().any(|u| u == "*" || u == sender_id) {
            return SenderCheckResult::Allowed;
        }

        debug!(sender_id, "Upload denied");
        SenderCheckResult::Denied {
            sender_id: sender_id.into(),
            reason: format!(
                "Sender '{}' not in allowlist ({} uploaders configured)",
                sender_id,
                self.allowed.len()
            ),
        }
    }
}
