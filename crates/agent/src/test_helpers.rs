//! Shared test doubles for the pipeline tests.

use async_trait::async_trait;
use solverbot_core::channel::{Attachment, Channel};
use solverbot_core::error::{ChannelError, RenderError, UpstreamError};
use solverbot_core::message::Message;
use solverbot_core::provider::{Provider, ProviderRequest, ProviderResponse};
use solverbot_core::render::FormulaRenderer;
use std::sync::Mutex;

/// A provider that replays scripted outcomes and records every request.
///
/// Panics if more calls are made than outcomes provided.
pub struct ScriptedProvider {
    outcomes: Mutex<Vec<Result<String, UpstreamError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(outcomes: Vec<Result<String, UpstreamError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self::new(vec![Err(error)])
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, UpstreamError> {
        let model = request.model.clone();
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len() - 1
        };

        let outcomes = self.outcomes.lock().unwrap();
        let outcome = outcomes.get(call).cloned().unwrap_or_else(|| {
            panic!(
                "ScriptedProvider: no more outcomes (call #{call}, have {})",
                outcomes.len()
            )
        });

        outcome.map(|text| ProviderResponse {
            message: Message::assistant(text),
            usage: None,
            model,
        })
    }
}

/// A formula renderer returning a fixed outcome and recording its inputs.
pub struct ScriptedRenderer {
    outcome: Result<Vec<u8>, RenderError>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRenderer {
    pub fn ok(image: &[u8]) -> Self {
        Self {
            outcome: Ok(image.to_vec()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: RenderError) -> Self {
        Self {
            outcome: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FormulaRenderer for ScriptedRenderer {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError> {
        self.calls.lock().unwrap().push(markup.to_string());
        self.outcome.clone()
    }
}

/// What a [`RecordingChannel`] was asked to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text(String),
    Html(String),
    Photo(Vec<u8>),
}

/// A channel that records outbound traffic and serves fixed document bytes.
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, Sent)>>,
    document: Vec<u8>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::with_document(Vec::new())
    }

    pub fn with_document(document: Vec<u8>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            document,
        }
    }

    /// Everything sent, in order, without chat ids.
    pub fn sent(&self) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn sent_to(&self, chat_id: &str) -> Vec<Sent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c == chat_id)
            .map(|(_, s)| s.clone())
            .collect()
    }

    fn record(&self, chat_id: &str, sent: Sent) {
        self.sent.lock().unwrap().push((chat_id.to_string(), sent));
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), ChannelError> {
        self.record(chat_id, Sent::Text(text.to_string()));
        Ok(())
    }

    async fn send_html(&self, chat_id: &str, html: &str) -> Result<(), ChannelError> {
        self.record(chat_id, Sent::Html(html.to_string()));
        Ok(())
    }

    async fn send_photo(&self, chat_id: &str, image: &[u8]) -> Result<(), ChannelError> {
        self.record(chat_id, Sent::Photo(image.to_vec()));
        Ok(())
    }

    async fn download(&self, _attachment: &Attachment) -> Result<Vec<u8>, ChannelError> {
        Ok(self.document.clone())
    }
}
