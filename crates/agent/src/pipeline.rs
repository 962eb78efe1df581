//! The assistant pipeline: one inbound message in, zero or more replies out.
//!
//! Documents go through the uploader gate and ingestion, and arm the priming
//! flag. Text turns are assembled, answered, rendered and delivered. The
//! conversation's state lock is held for the whole turn.

use crate::client::ReasoningClient;
use crate::context::ContextAssembler;
use crate::ingest::Ingestor;
use crate::lookup::KnowledgeLookup;
use crate::render::{RenderedReply, ReplyRenderer};
use crate::state::{ConversationState, ConversationStates};
use solverbot_config::{AppConfig, MessagesConfig};
use solverbot_core::channel::{Attachment, Channel, ChannelMessage, InboundKind};
use solverbot_core::error::{ChannelError, Error};
use solverbot_core::memory::{KnowledgeStore, TurnStore};
use solverbot_core::message::{ConversationId, Role};
use solverbot_core::provider::Provider;
use solverbot_core::render::FormulaRenderer;
use solverbot_security::{SenderCheckResult, UploadPolicy};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// How a message was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// Commands and non-PDF documents.
    Ignored,
    /// Upload from a sender outside the allowlist.
    Refused,
    Ingested { document_id: String, chars: usize },
    /// The text became the conversation's system directive.
    Primed,
    Greeted,
    Answered { image: bool },
    /// The turn was aborted and the failure notice sent.
    Failed,
}

pub struct Assistant {
    states: ConversationStates,
    turns: Arc<dyn TurnStore>,
    ingestor: Ingestor,
    assembler: ContextAssembler,
    client: ReasoningClient,
    renderer: ReplyRenderer,
    render_timeout: Duration,
    upload_policy: Arc<dyn UploadPolicy>,
    greetings: Vec<String>,
    messages: MessagesConfig,
}

impl Assistant {
    /// Wire the pipeline from configuration and its collaborators.
    ///
    /// Replies are styled but never typeset until [`Assistant::with_renderer`]
    /// supplies a formula renderer.
    pub fn new(
        config: &AppConfig,
        turns: Arc<dyn TurnStore>,
        knowledge: Arc<dyn KnowledgeStore>,
        provider: Arc<dyn Provider>,
        upload_policy: Arc<dyn UploadPolicy>,
    ) -> Self {
        let lookup = KnowledgeLookup::new(knowledge.clone())
            .with_max_results(config.knowledge.max_results)
            .with_excerpt_radius(config.knowledge.excerpt_radius);

        let assembler = ContextAssembler::new(
            turns.clone(),
            lookup,
            config.assistant.system_prompt.clone(),
        )
        .with_history_limit(config.memory.history_limit);

        let client = ReasoningClient::new(provider, turns.clone(), config.provider.model.clone())
            .with_temperature(config.provider.temperature)
            .with_max_tokens(config.provider.max_tokens)
            .with_timeout(Duration::from_secs(config.provider.timeout_secs));

        let render_timeout = Duration::from_secs(config.render.timeout_secs);

        Self {
            states: ConversationStates::new(),
            turns,
            ingestor: Ingestor::new(knowledge),
            assembler,
            client,
            renderer: ReplyRenderer::text_only().with_timeout(render_timeout),
            render_timeout,
            upload_policy,
            greetings: config.assistant.greetings.clone(),
            messages: config.assistant.messages.clone(),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn FormulaRenderer>) -> Self {
        self.renderer = ReplyRenderer::new(renderer).with_timeout(self.render_timeout);
        self
    }

    /// Snapshot of a conversation's transient state.
    pub async fn state(&self, conversation_id: &ConversationId) -> ConversationState {
        self.states.get(conversation_id).await
    }

    /// Handle one inbound message, replying through `channel`.
    ///
    /// Storage, upstream and download failures abort the turn: the error is
    /// logged and the user gets the generic failure notice.
    pub async fn handle(&self, message: &ChannelMessage, channel: &dyn Channel) -> Handled {
        let conversation_id = ConversationId::from(message.chat_id.as_str());
        let slot = self.states.slot(&conversation_id);
        let mut state = slot.lock().await;

        let handled = self
            .handle_locked(&conversation_id, message, &mut state, channel)
            .await;

        drop(state);
        drop(slot);
        self.states.release(&conversation_id);
        handled
    }

    async fn handle_locked(
        &self,
        conversation_id: &ConversationId,
        message: &ChannelMessage,
        state: &mut ConversationState,
        channel: &dyn Channel,
    ) -> Handled {
        let outcome = match &message.kind {
            InboundKind::Document { attachment } => {
                self.on_document(conversation_id, message, attachment, state, channel)
                    .await
            }
            InboundKind::Text { text } => {
                self.on_text(conversation_id, text, state, channel)
                    .await
            }
        };

        match outcome {
            Ok(handled) => handled,
            Err(e) => {
                error!(
                    conversation_id = %conversation_id,
                    channel = channel.name(),
                    error = %e,
                    "Turn failed"
                );
                deliver(channel.send_text(&message.chat_id, &self.messages.failure).await);
                Handled::Failed
            }
        }
    }

    async fn on_document(
        &self,
        conversation_id: &ConversationId,
        message: &ChannelMessage,
        attachment: &Attachment,
        state: &mut ConversationState,
        channel: &dyn Channel,
    ) -> Result<Handled, Error> {
        if let SenderCheckResult::Denied { sender_id, reason } =
            self.upload_policy.check_uploader(&message.sender_id)
        {
            info!(
                conversation_id = %conversation_id,
                sender_id = %sender_id,
                reason = %reason,
                "Upload refused"
            );
            deliver(
                channel
                    .send_text(&message.chat_id, &self.messages.upload_denied)
                    .await,
            );
            return Ok(Handled::Refused);
        }

        if !attachment.is_pdf() {
            debug!(
                conversation_id = %conversation_id,
                file_id = %attachment.file_id,
                mime_type = ?attachment.mime_type,
                "Ignoring non-PDF document"
            );
            return Ok(Handled::Ignored);
        }

        deliver(channel.send_typing(&message.chat_id).await);

        let bytes = channel.download(attachment).await?;
        let document_id = attachment.file_id.clone();
        let chars = self.ingestor.ingest_pdf(&document_id, bytes).await?;

        *state = ConversationState::after_ingest(document_id.clone());
        info!(
            conversation_id = %conversation_id,
            document_id = %document_id,
            chars,
            "Document ingested; awaiting priming turn"
        );

        deliver(
            channel
                .send_text(&message.chat_id, &self.messages.upload_saved)
                .await,
        );
        Ok(Handled::Ingested { document_id, chars })
    }

    async fn on_text(
        &self,
        conversation_id: &ConversationId,
        text: &str,
        state: &mut ConversationState,
        channel: &dyn Channel,
    ) -> Result<Handled, Error> {
        let chat_id = conversation_id.as_str();

        if text.trim_start().starts_with('/') {
            debug!(conversation_id = %conversation_id, "Ignoring bot command");
            return Ok(Handled::Ignored);
        }

        if self.is_greeting(text) {
            deliver(channel.send_text(chat_id, &self.messages.greeting_reply).await);
            return Ok(Handled::Greeted);
        }

        deliver(channel.send_typing(chat_id).await);

        let (context, next) = self.assembler.build(conversation_id, text, state).await?;

        if context.priming {
            self.turns.append(conversation_id, Role::System, text).await?;
            *state = next;
            info!(conversation_id = %conversation_id, "System directive replaced by priming turn");
            return Ok(Handled::Primed);
        }

        let reply = self.client.ask(conversation_id, text, context.messages).await?;
        *state = next;

        match self.renderer.render(&reply).await {
            RenderedReply::Plain(text) => {
                deliver(channel.send_text(chat_id, &text).await);
                Ok(Handled::Answered { image: false })
            }
            RenderedReply::Rich { html, image } => {
                if !html.trim().is_empty() {
                    deliver(channel.send_html(chat_id, &html).await);
                }
                let sent_image = image.is_some();
                if let Some(image) = image {
                    deliver(channel.send_photo(chat_id, &image).await);
                }
                Ok(Handled::Answered { image: sent_image })
            }
        }
    }

    /// Whole-message match against the configured greetings, ignoring case
    /// and surrounding punctuation.
    fn is_greeting(&self, text: &str) -> bool {
        let normalized = text
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        !normalized.is_empty()
            && self
                .greetings
                .iter()
                .any(|g| g.trim().to_lowercase() == normalized)
    }
}

/// Delivery is best-effort: failures are logged, never propagated.
fn deliver(result: Result<(), ChannelError>) {
    if let Err(e) = result {
        warn!(error = %e, "Delivery failed");
    }
}
