//! Reasoning client: one request to the model, one recorded turn pair.

use solverbot_core::error::{Error, UpstreamError};
use solverbot_core::memory::TurnStore;
use solverbot_core::message::{ConversationId, Message};
use solverbot_core::provider::{DEFAULT_TEMPERATURE, Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct ReasoningClient {
    provider: Arc<dyn Provider>,
    turns: Arc<dyn TurnStore>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    timeout: Duration,
}

impl ReasoningClient {
    pub fn new(
        provider: Arc<dyn Provider>,
        turns: Arc<dyn TurnStore>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            turns,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Upper bound on a whole completion call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send `messages` and return the top reply.
    ///
    /// On success the `(user, user_text)` and `(assistant, reply)` turns are
    /// appended together, in that order. On failure nothing is written.
    pub async fn ask(
        &self,
        conversation_id: &ConversationId,
        user_text: &str,
        messages: Vec<Message>,
    ) -> Result<String, Error> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(
            conversation_id = %conversation_id,
            provider = self.provider.name(),
            messages = request.messages.len(),
            "Asking reasoning model"
        );

        let response = tokio::time::timeout(self.timeout, self.provider.complete(request))
            .await
            .map_err(|_| UpstreamError::Timeout(self.timeout.as_secs()))??;

        let reply = response.message.content;

        self.turns
            .append_pair(conversation_id, user_text, &reply)
            .await?;

        if let Some(usage) = &response.usage {
            info!(
                conversation_id = %conversation_id,
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Reply received"
            );
        } else {
            info!(conversation_id = %conversation_id, model = %response.model, "Reply received");
        }

        Ok(reply)
    }
}
