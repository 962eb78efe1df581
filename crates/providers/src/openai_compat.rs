//! OpenAI-compatible reasoning provider.
//!
//! Works with Gemini's OpenAI endpoint, OpenAI, OpenRouter, Ollama, vLLM and
//! anything else exposing `POST /chat/completions`. Only non-streaming
//! completions are used: one request, one reply.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solverbot_config::KeyPlacement;
use solverbot_core::error::UpstreamError;
use solverbot_core::message::Message;
use solverbot_core::provider::*;
use std::time::Duration;
use tracing::{debug, warn};

pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    key_placement: KeyPlacement,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider for `base_url` (the part before `/chat/completions`).
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| UpstreamError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            key_placement: KeyPlacement::Bearer,
            timeout_secs,
            client,
        })
    }

    /// Send the key as `?key=` instead of a bearer header.
    pub fn with_key_placement(mut self, placement: KeyPlacement) -> Self {
        self.key_placement = placement;
        self
    }

    /// Gemini through its OpenAI-compatible surface.
    pub fn gemini(api_key: impl Into<String>) -> Result<Self, UpstreamError> {
        Self::new(
            "gemini",
            "https://generativelanguage.googleapis.com/v1beta/openai",
            Some(api_key.into()),
            60,
        )
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.api_key, self.key_placement) {
            (Some(key), KeyPlacement::Bearer) => {
                builder.header("Authorization", format!("Bearer {key}"))
            }
            (Some(key), KeyPlacement::Query) => builder.query(&[("key", key)]),
            (None, _) => builder,
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> UpstreamError {
        if e.is_timeout() {
            UpstreamError::Timeout(self.timeout_secs)
        } else {
            UpstreamError::Network(e.to_string())
        }
    }

    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: Some(m.content.clone()),
            })
            .collect()
    }
}

/// Parse a `/chat/completions` body into the top reply.
pub fn parse_completion(body: &str, requested_model: &str) -> Result<ProviderResponse, UpstreamError> {
    let api_response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| UpstreamError::Malformed(format!("Failed to parse response: {e}")))?;

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| UpstreamError::Malformed("No choices in response".into()))?;

    let content = choice
        .message
        .content
        .ok_or_else(|| UpstreamError::Malformed("First choice has no content".into()))?;

    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(ProviderResponse {
        message: Message::assistant(content),
        usage,
        model: api_response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
    })
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, UpstreamError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %error_body, "Provider returned error");
            return Err(UpstreamError::Status {
                status_code: status.as_u16(),
                message: error_body,
            });
        }

        let text = response.text().await.map_err(|e| self.map_send_error(e))?;
        parse_completion(&text, &request.model)
    }

    async fn health_check(&self) -> std::result::Result<bool, UpstreamError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
