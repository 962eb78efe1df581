//! Telegram channel adapter.
//!
//! Talks to the Bot API over HTTPS with `reqwest`. Inbound traffic arrives as
//! webhook `Update` payloads, parsed by [`parse_update`]; outbound replies use
//! `sendMessage` (plain or HTML parse mode) and `sendPhoto` (multipart).

use async_trait::async_trait;
use serde::Deserialize;
use solverbot_core::channel::{Attachment, Channel, ChannelMessage, InboundKind};
use solverbot_core::error::ChannelError;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Telegram rejects messages longer than 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4000;

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token from @BotFather.
    pub bot_token: String,
    /// Bot API base URL, without the `/bot<token>` suffix.
    pub api_base: String,
}

impl TelegramConfig {
    /// Extract the channel settings from `[telegram]`; the token is required.
    pub fn from_app(config: &solverbot_config::TelegramConfig) -> Result<Self, ChannelError> {
        let bot_token = config
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ChannelError::NotConfigured(
                    "telegram.bot_token (or TELEGRAM_BOT_TOKEN) is not set".into(),
                )
            })?;

        Ok(Self {
            bot_token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .finish()
    }
}

// ── Telegram API Types ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TgResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// The subset of a webhook `Update` the assistant reacts to.
#[derive(Debug, Deserialize)]
pub struct TgUpdate {
    pub update_id: i64,
    #[serde(default)]
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    #[allow(dead_code)]
    message_id: i64,
    from: Option<TgUser>,
    chat: TgChat,
    text: Option<String>,
    document: Option<TgDocument>,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    first_name: String,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgDocument {
    file_id: String,
    file_name: Option<String>,
    mime_type: Option<String>,
    file_size: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TgFile {
    file_path: Option<String>,
}

/// Parse a webhook body.
///
/// Returns `Ok(None)` for updates that carry nothing the assistant handles
/// (edits, callbacks, stickers, photos).
pub fn parse_update(body: &[u8]) -> Result<Option<ChannelMessage>, ChannelError> {
    let update: TgUpdate = serde_json::from_slice(body)
        .map_err(|e| ChannelError::InvalidPayload(format!("Update JSON: {e}")))?;
    Ok(update_to_message(update))
}

fn update_to_message(update: TgUpdate) -> Option<ChannelMessage> {
    let message = update.message?;

    let kind = if let Some(doc) = message.document {
        InboundKind::Document {
            attachment: Attachment {
                file_id: doc.file_id,
                filename: doc.file_name,
                mime_type: doc.mime_type,
                size_bytes: doc.file_size,
            },
        }
    } else if let Some(text) = message.text {
        InboundKind::Text { text }
    } else {
        debug!(update_id = update.update_id, "Ignoring update without text or document");
        return None;
    };

    let chat_id = message.chat.id.to_string();
    let (sender_id, sender_name) = match message.from {
        Some(user) => (
            user.id.to_string(),
            Some(user.username.unwrap_or(user.first_name)),
        ),
        None => (chat_id.clone(), None),
    };

    Some(ChannelMessage {
        chat_id,
        sender_id,
        sender_name,
        kind,
    })
}

/// Split text into chunks Telegram accepts, preferring line then word breaks.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while remaining.chars().count() > max_chars {
        let hard_cut = remaining
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(remaining.len());
        let window = &remaining[..hard_cut];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(hard_cut);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    if !remaining.is_empty() || chunks.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}

/// One indivisible piece of HTML-mode text.
struct HtmlToken<'a> {
    text: &'a str,
    /// `(name, closing)` for `<name>` / `</name>`.
    tag: Option<(&'a str, bool)>,
}

fn html_tokens(html: &str) -> Vec<HtmlToken<'_>> {
    let mut tokens = Vec::new();
    let mut rest = html;

    while let Some(c) = rest.chars().next() {
        let len = match c {
            '<' => rest.find('>').map(|i| i + 1),
            '&' => rest
                .char_indices()
                .skip(1)
                .take(10)
                .find(|&(_, ch)| !(ch.is_ascii_alphanumeric() || ch == '#'))
                .filter(|&(_, ch)| ch == ';')
                .map(|(i, _)| i + 1),
            _ => None,
        }
        .unwrap_or(c.len_utf8());

        let text = &rest[..len];
        let tag = (len > 2 && text.starts_with('<')).then(|| {
            let inner = text[1..len - 1].trim();
            let closing = inner.starts_with('/');
            let name = inner
                .trim_start_matches('/')
                .split_whitespace()
                .next()
                .unwrap_or("");
            (name, closing)
        });
        tokens.push(HtmlToken { text, tag });
        rest = &rest[len..];
    }
    tokens
}

/// Split HTML-mode text into chunks Telegram accepts.
///
/// Tags and entities are never cut. Tags still open at a cut are closed at
/// the end of the chunk and reopened at the start of the next one, so each
/// chunk parses on its own. Closing tags count against `max_chars`.
pub fn split_html(html: &str, max_chars: usize) -> Vec<String> {
    let tokens = html_tokens(html);
    let mut chunks = Vec::new();
    let mut open: Vec<&str> = Vec::new();
    let mut start = 0;

    while start < tokens.len() {
        let mut chunk: String = open.iter().map(|name| format!("<{name}>")).collect();
        let mut len = chunk.chars().count();
        let mut stack = open.clone();
        let mut end = start;
        let mut line_break = None;
        let mut word_break = None;

        while end < tokens.len() {
            let token = &tokens[end];
            let mut next = stack.clone();
            match token.tag {
                Some((name, false)) => next.push(name),
                Some((name, true)) => {
                    if let Some(i) = next.iter().rposition(|open| *open == name) {
                        next.remove(i);
                    }
                }
                None => {}
            }
            let closing: usize = next.iter().map(|name| name.len() + 3).sum();
            let token_len = token.text.chars().count();
            if end > start && len + token_len + closing > max_chars {
                break;
            }

            len += token_len;
            stack = next;
            end += 1;
            match token.text {
                "\n" => line_break = Some((end, stack.clone())),
                " " => word_break = Some((end, stack.clone())),
                _ => {}
            }
        }

        let (cut, cut_stack) = if end < tokens.len() {
            line_break
                .or(word_break)
                .unwrap_or((end, stack))
        } else {
            (end, stack)
        };

        for token in &tokens[start..cut] {
            chunk.push_str(token.text);
        }
        chunk.truncate(chunk.trim_end().len());
        for name in cut_stack.iter().rev() {
            chunk.push_str(&format!("</{name}>"));
        }
        chunks.push(chunk);

        start = cut;
        while tokens
            .get(start)
            .is_some_and(|t| t.tag.is_none() && t.text.trim().is_empty())
        {
            start += 1;
        }
        open = cut_stack;
    }

    if chunks.is_empty() {
        chunks.push(String::new());
    }
    chunks
}

/// Telegram channel adapter.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(config: TelegramConfig) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ChannelError::NotConfigured(format!("HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.config.api_base, self.config.bot_token, method)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.config.api_base, self.config.bot_token, file_path
        )
    }

    fn delivery_failed(reason: impl Into<String>) -> ChannelError {
        ChannelError::DeliveryFailed {
            channel: "telegram".into(),
            reason: reason.into(),
        }
    }

    /// Decode a Bot API envelope, turning `ok: false` into an error.
    async fn read_envelope<T: serde::de::DeserializeOwned>(
        method: &str,
        response: reqwest::Response,
    ) -> Result<Option<T>, ChannelError> {
        let envelope: TgResponse<T> = response
            .json()
            .await
            .map_err(|e| Self::delivery_failed(format!("{method}: unreadable response: {e}")))?;

        if !envelope.ok {
            return Err(Self::delivery_failed(format!(
                "{method}: {}",
                envelope.description.unwrap_or_default()
            )));
        }
        Ok(envelope.result)
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<Option<T>, ChannelError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::delivery_failed(format!("{method}: {e}")))?;
        Self::read_envelope(method, response).await
    }

    async fn send_chunks(
        &self,
        chat_id: &str,
        text: &str,
        parse_mode: Option<&str>,
    ) -> Result<(), ChannelError> {
        let chunks = match parse_mode {
            Some("HTML") => split_html(text, MAX_MESSAGE_CHARS),
            _ => split_message(text, MAX_MESSAGE_CHARS),
        };
        for chunk in chunks {
            let mut body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
            });
            if let Some(mode) = parse_mode {
                body["parse_mode"] = serde_json::json!(mode);
            }
            self.call::<serde_json::Value>("sendMessage", body).await?;
        }
        Ok(())
    }

    /// The bot's username, via `getMe`.
    pub async fn get_me(&self) -> Result<String, ChannelError> {
        let me: Option<serde_json::Value> = self.call("getMe", serde_json::json!({})).await?;
        Ok(me
            .and_then(|m| m["username"].as_str().map(String::from))
            .unwrap_or_else(|| "unknown".into()))
    }

    /// Register the webhook, dropping updates queued while the bot was down.
    pub async fn set_webhook(&self, url: &str, secret_token: Option<&str>) -> Result<(), ChannelError> {
        let mut body = serde_json::json!({
            "url": url,
            "drop_pending_updates": true,
            "allowed_updates": ["message"],
        });
        if let Some(secret) = secret_token {
            body["secret_token"] = serde_json::json!(secret);
        }
        self.call::<serde_json::Value>("setWebhook", body).await?;
        info!(url, "Telegram webhook registered");
        Ok(())
    }

    pub async fn delete_webhook(&self) -> Result<(), ChannelError> {
        self.call::<serde_json::Value>(
            "deleteWebhook",
            serde_json::json!({ "drop_pending_updates": true }),
        )
        .await?;
        info!("Telegram webhook deleted");
        Ok(())
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        self.send_chunks(chat_id, text, None).await
    }

    async fn send_html(&self, chat_id: &str, html: &str) -> Result<(), ChannelError> {
        self.send_chunks(chat_id, html, Some("HTML")).await
    }

    async fn send_photo(&self, chat_id: &str, image: &[u8]) -> Result<(), ChannelError> {
        let part = reqwest::multipart::Part::bytes(image.to_vec())
            .file_name("formula.png")
            .mime_str("image/png")
            .map_err(|e| Self::delivery_failed(format!("sendPhoto: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::delivery_failed(format!("sendPhoto: {e}")))?;
        Self::read_envelope::<serde_json::Value>("sendPhoto", response).await?;
        Ok(())
    }

    async fn download(&self, attachment: &Attachment) -> Result<Vec<u8>, ChannelError> {
        let download_failed = |reason: String| ChannelError::DownloadFailed {
            file_id: attachment.file_id.clone(),
            reason,
        };

        let file: Option<TgFile> = self
            .call("getFile", serde_json::json!({ "file_id": attachment.file_id }))
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        let file_path = file
            .and_then(|f| f.file_path)
            .ok_or_else(|| download_failed("getFile returned no file_path".into()))?;

        let response = self
            .client
            .get(self.file_url(&file_path))
            .send()
            .await
            .map_err(|e| download_failed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(download_failed(format!("status {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| download_failed(e.to_string()))?;
        debug!(file_id = %attachment.file_id, bytes = bytes.len(), "Downloaded document");
        Ok(bytes.to_vec())
    }

    async fn send_typing(&self, chat_id: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "action": "typing",
        });
        if let Err(e) = self.call::<serde_json::Value>("sendChatAction", body).await {
            warn!(error = %e, "sendChatAction failed");
        }
        Ok(())
    }
}
