//! CLI channel — interactive terminal-based chat.
//!
//! Reads lines from stdin and prints replies to stdout. Rendered formulas
//! are written as PNG files under an output directory. Used by
//! `solverbot chat`.
//!
//! A line of the form `:upload <path>` is delivered as a document whose
//! file id is the local path.

use async_trait::async_trait;
use solverbot_core::channel::{Attachment, Channel, ChannelMessage, InboundKind};
use solverbot_core::error::ChannelError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const CLI_CHAT_ID: &str = "cli_session";
pub const CLI_SENDER_ID: &str = "local_user";

pub struct CliChannel {
    image_dir: PathBuf,
    images_written: AtomicUsize,
}

impl CliChannel {
    pub fn new(image_dir: impl Into<PathBuf>) -> Self {
        Self {
            image_dir: image_dir.into(),
            images_written: AtomicUsize::new(0),
        }
    }

    /// Spawn the stdin reader. The receiver closes on EOF or an exit command.
    pub fn start(&self) -> mpsc::Receiver<ChannelMessage> {
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let reader = BufReader::new(io::stdin());
            let mut lines = reader.lines();

            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }

                if matches!(line.as_str(), "exit" | "quit" | ":q") {
                    break;
                }

                if tx.send(parse_line(&line)).await.is_err() {
                    break;
                }
            }
        });

        rx
    }
}

/// Turn one input line into an inbound message.
pub fn parse_line(line: &str) -> ChannelMessage {
    let kind = match line.strip_prefix(":upload ") {
        Some(path) => {
            let path = path.trim();
            InboundKind::Document {
                attachment: Attachment {
                    file_id: path.to_string(),
                    filename: Path::new(path)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned()),
                    mime_type: None,
                    size_bytes: None,
                },
            }
        }
        None => InboundKind::Text {
            text: line.to_string(),
        },
    };

    ChannelMessage {
        chat_id: CLI_CHAT_ID.into(),
        sender_id: CLI_SENDER_ID.into(),
        sender_name: Some("User".into()),
        kind,
    }
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn send_text(&self, _chat_id: &str, text: &str) -> Result<(), ChannelError> {
        println!("{text}");
        Ok(())
    }

    async fn send_html(&self, _chat_id: &str, html: &str) -> Result<(), ChannelError> {
        println!("{html}");
        Ok(())
    }

    async fn send_photo(&self, _chat_id: &str, image: &[u8]) -> Result<(), ChannelError> {
        let n = self.images_written.fetch_add(1, Ordering::SeqCst) + 1;
        let path = self.image_dir.join(format!("formula-{n}.png"));

        let delivery_failed = |e: std::io::Error| ChannelError::DeliveryFailed {
            channel: "cli".into(),
            reason: format!("{}: {e}", path.display()),
        };
        tokio::fs::create_dir_all(&self.image_dir)
            .await
            .map_err(delivery_failed)?;
        tokio::fs::write(&path, image)
            .await
            .map_err(delivery_failed)?;

        println!("[formula image: {}]", path.display());
        Ok(())
    }

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, ChannelError> {
        tokio::fs::read(&attachment.file_id)
            .await
            .map_err(|e| ChannelError::DownloadFailed {
                file_id: attachment.file_id.clone(),
                reason: e.to_string(),
            })
    }
}
