//! Channel trait — the abstraction over the messaging transport.
//!
//! A Channel turns platform payloads into [`ChannelMessage`]s and delivers
//! replies back: plain text, HTML-styled text, and photos. It also fetches
//! the bytes of uploaded documents.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// A message received from a channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// The chat/group/DM identifier; doubles as the conversation id
    pub chat_id: String,

    /// Sender identifier (platform-specific user ID)
    pub sender_id: String,

    /// Human-readable sender name (if available)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,

    /// What was sent
    pub kind: InboundKind,
}

/// The payload of an inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundKind {
    Text { text: String },
    Document { attachment: Attachment },
}

/// An uploaded file, referenced by the platform's identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Platform file identifier; used as the knowledge document id
    pub file_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

impl Attachment {
    /// Whether this attachment looks like a PDF document.
    pub fn is_pdf(&self) -> bool {
        self.mime_type.as_deref() == Some("application/pdf")
            || self
                .filename
                .as_deref()
                .is_some_and(|f| f.to_ascii_lowercase().ends_with(".pdf"))
    }
}

/// The core Channel trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Human-readable channel name (e.g., "telegram", "cli").
    fn name(&self) -> &str;

    /// Send unformatted text.
    async fn send_text(&self, chat_id: &str, text: &str) -> std::result::Result<(), ChannelError>;

    /// Send text using the platform's HTML markup (`<b>` etc.).
    async fn send_html(&self, chat_id: &str, html: &str) -> std::result::Result<(), ChannelError>;

    /// Send an image.
    async fn send_photo(&self, chat_id: &str, image: &[u8])
    -> std::result::Result<(), ChannelError>;

    /// Fetch the raw bytes of an uploaded document.
    async fn download(&self, attachment: &Attachment) -> std::result::Result<Vec<u8>, ChannelError>;

    /// Send a typing indicator (if the platform supports it).
    async fn send_typing(&self, _chat_id: &str) -> std::result::Result<(), ChannelError> {
        Ok(()) // No-op default
    }
}
