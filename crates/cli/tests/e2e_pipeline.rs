//! End-to-end tests for the SolverBot conversation pipeline.
//!
//! These drive real storage (in-memory and SQLite) through the assembler,
//! the reasoning client and the full `Assistant`, with scripted remote
//! endpoints and a recording channel.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use solverbot_agent::{
    Assistant, ContextAssembler, ConversationState, Handled, KnowledgeLookup, ReasoningClient,
};
use solverbot_config::AppConfig;
use solverbot_core::channel::{Attachment, Channel, ChannelMessage, InboundKind};
use solverbot_core::error::{ChannelError, RenderError, UpstreamError};
use solverbot_core::memory::{KnowledgeStore, KnowledgeUnit, TurnStore};
use solverbot_core::message::{ConversationId, Message, Role};
use solverbot_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use solverbot_core::render::FormulaRenderer;
use solverbot_memory::{InMemoryStore, SqliteStore, Stores};
use solverbot_security::AllowlistPolicy;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted replies in sequence.
struct ScriptedProvider {
    replies: Vec<String>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: replies.iter().map(|r| r.to_string()).collect(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, n: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, UpstreamError> {
        let mut requests = self.requests.lock().unwrap();
        let n = requests.len();
        let model = request.model.clone();
        requests.push(request);
        let reply = self.replies.get(n).cloned().unwrap_or_else(|| {
            panic!("ScriptedProvider exhausted: call #{n}, have {}", self.replies.len())
        });
        Ok(ProviderResponse {
            message: Message::assistant(reply),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model,
        })
    }
}

// ── Mock Renderer ────────────────────────────────────────────────────────

const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

struct PngRenderer {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl FormulaRenderer for PngRenderer {
    fn name(&self) -> &str {
        "png_mock"
    }

    async fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError> {
        self.seen.lock().unwrap().push(markup.to_string());
        Ok(PNG.to_vec())
    }
}

// ── Mock Channel ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Out {
    Text(String),
    Html(String),
    Photo(usize),
}

struct RecordingChannel {
    pdf: Vec<u8>,
    out: Mutex<Vec<Out>>,
}

impl RecordingChannel {
    fn new() -> Self {
        Self {
            pdf: b"%PDF-1.7 not really".to_vec(),
            out: Mutex::new(Vec::new()),
        }
    }

    fn take(&self) -> Vec<Out> {
        std::mem::take(&mut *self.out.lock().unwrap())
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send_text(&self, _chat_id: &str, text: &str) -> Result<(), ChannelError> {
        self.out.lock().unwrap().push(Out::Text(text.into()));
        Ok(())
    }

    async fn send_html(&self, _chat_id: &str, html: &str) -> Result<(), ChannelError> {
        self.out.lock().unwrap().push(Out::Html(html.into()));
        Ok(())
    }

    async fn send_photo(&self, _chat_id: &str, image: &[u8]) -> Result<(), ChannelError> {
        self.out.lock().unwrap().push(Out::Photo(image.len()));
        Ok(())
    }

    async fn download(&self, _attachment: &Attachment) -> Result<Vec<u8>, ChannelError> {
        Ok(self.pdf.clone())
    }
}

fn text(chat: &str, sender: &str, body: &str) -> ChannelMessage {
    ChannelMessage {
        chat_id: chat.into(),
        sender_id: sender.into(),
        sender_name: None,
        kind: InboundKind::Text { text: body.into() },
    }
}

fn pdf_upload(chat: &str, sender: &str, file_id: &str) -> ChannelMessage {
    ChannelMessage {
        chat_id: chat.into(),
        sender_id: sender.into(),
        sender_name: Some("admin".into()),
        kind: InboundKind::Document {
            attachment: Attachment {
                file_id: file_id.into(),
                filename: Some("mechanics.pdf".into()),
                mime_type: Some("application/pdf".into()),
                size_bytes: Some(19),
            },
        },
    }
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_fresh_conversation_build_then_ask() {
    let store = Arc::new(InMemoryStore::new());
    let config = AppConfig::default();
    let conv = ConversationId::from("abc");

    let assembler = ContextAssembler::new(
        store.clone(),
        KnowledgeLookup::new(store.clone()),
        config.assistant.system_prompt.clone(),
    );
    let (context, next) = assembler
        .build(&conv, "Hello", &ConversationState::default())
        .await
        .unwrap();

    assert_eq!(
        context.messages,
        vec![
            Message::system(config.assistant.system_prompt.clone()),
            Message::user("Hello"),
        ]
    );
    assert_eq!(next, ConversationState::default());

    let provider = Arc::new(ScriptedProvider::new(&["Hello! What shall we solve?"]));
    let client = ReasoningClient::new(provider.clone(), store.clone(), &config.provider.model);
    let reply = client.ask(&conv, "Hello", context.messages).await.unwrap();

    assert_eq!(reply, "Hello! What shall we solve?");
    let turns = store.recent(&conv, 20).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!((turns[0].role, turns[0].content.as_str()), (Role::User, "Hello"));
    assert_eq!(
        (turns[1].role, turns[1].content.as_str()),
        (Role::Assistant, "Hello! What shall we solve?")
    );
    assert!((provider.request(0).temperature - 0.2).abs() < f32::EPSILON);
}

#[tokio::test]
async fn e2e_upload_prime_and_answer_with_formula_on_sqlite() {
    let stores = Stores::shared(SqliteStore::new("sqlite::memory:").await.unwrap());
    let provider = Arc::new(ScriptedProvider::new(&[
        "**Momentum**: $p = mv$",
        "Twice the speed doubles it.",
    ]));
    let renderer = Arc::new(PngRenderer {
        seen: Mutex::new(Vec::new()),
    });

    let assistant = Assistant::new(
        &AppConfig::default(),
        stores.turns.clone(),
        stores.knowledge.clone(),
        provider.clone(),
        Arc::new(AllowlistPolicy::new(["1"])),
    )
    .with_renderer(renderer.clone());
    let channel = RecordingChannel::new();
    let conv = ConversationId::from("500");

    // A stranger's upload is refused.
    assert_eq!(
        assistant.handle(&pdf_upload("500", "2", "doc-x"), &channel).await,
        Handled::Refused
    );
    channel.take();

    // The admin's upload is stored and arms priming.
    let handled = assistant.handle(&pdf_upload("500", "1", "doc-1"), &channel).await;
    assert!(matches!(handled, Handled::Ingested { ref document_id, .. } if document_id == "doc-1"));
    assert_eq!(assistant.state(&conv).await, ConversationState::after_ingest("doc-1"));
    stores
        .knowledge
        .insert(KnowledgeUnit {
            document_id: "doc-1".into(),
            content: "Linear momentum p equals mass times velocity.".into(),
        })
        .await
        .unwrap();
    assert_eq!(channel.take().len(), 1);

    // The next text primes; nothing goes to the model or the user.
    assert_eq!(
        assistant
            .handle(&text("500", "1", "Use SI units throughout."), &channel)
            .await,
        Handled::Primed
    );
    assert_eq!(provider.calls(), 0);
    assert!(channel.take().is_empty());

    // A question: knowledge folded in, formula rendered.
    assert_eq!(
        assistant.handle(&text("500", "3", "momentum"), &channel).await,
        Handled::Answered { image: true }
    );
    assert_eq!(
        channel.take(),
        vec![Out::Html("<b>Momentum</b>: p = mv".into()), Out::Photo(PNG.len())]
    );
    assert_eq!(*renderer.seen.lock().unwrap(), vec!["p = mv".to_string()]);

    let request = provider.request(0);
    let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::System, Role::System, Role::User]);
    assert_eq!(request.messages[1].content, "Use SI units throughout.");
    assert!(request.messages[2].content.contains("mass times velocity"));

    // Priming was consumed once: the next question is answered normally.
    assert_eq!(
        assistant
            .handle(&text("500", "3", "what if speed doubles?"), &channel)
            .await,
        Handled::Answered { image: false }
    );
    assert_eq!(
        channel.take(),
        vec![Out::Text("Twice the speed doubles it.".into())]
    );

    let turns = stores.turns.recent(&conv, 20).await.unwrap();
    let log: Vec<(Role, &str)> = turns.iter().map(|t| (t.role, t.content.as_str())).collect();
    assert_eq!(
        log,
        vec![
            (Role::System, "Use SI units throughout."),
            (Role::User, "momentum"),
            (Role::Assistant, "**Momentum**: $p = mv$"),
            (Role::User, "what if speed doubles?"),
            (Role::Assistant, "Twice the speed doubles it."),
        ]
    );
}

#[tokio::test]
async fn e2e_history_survives_a_new_assistant_on_the_same_database() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("bot.sqlite").display());
    let channel = RecordingChannel::new();

    {
        let stores = solverbot_memory::open("sqlite", &url).await.unwrap();
        let assistant = Assistant::new(
            &AppConfig::default(),
            stores.turns,
            stores.knowledge,
            Arc::new(ScriptedProvider::new(&["4"])),
            Arc::new(AllowlistPolicy::default()),
        );
        assistant.handle(&text("9", "9", "2+2?"), &channel).await;
    }

    let stores = solverbot_memory::open("sqlite", &url).await.unwrap();
    let provider = Arc::new(ScriptedProvider::new(&["6"]));
    let assistant = Assistant::new(
        &AppConfig::default(),
        stores.turns,
        stores.knowledge,
        provider.clone(),
        Arc::new(AllowlistPolicy::default()),
    );
    assistant.handle(&text("9", "9", "and 3+3?"), &channel).await;

    let request = provider.request(0);
    assert_eq!(request.messages.len(), 4);
    assert_eq!(request.messages[1], Message::user("2+2?"));
    assert_eq!(request.messages[2], Message::assistant("4"));
    assert_eq!(request.messages[3], Message::user("and 3+3?"));
}
