//! Webhook gateway for SolverBot.
//!
//! Telegram pushes updates to `POST {webhook_path}`; each accepted update is
//! handed to the [`Assistant`] on its own task and acknowledged immediately.
//! `GET /health` answers liveness probes.
//!
//! Built on Axum.

use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use solverbot_agent::Assistant;
use solverbot_channels::{TelegramChannel, TelegramConfig, parse_update};
use solverbot_config::AppConfig;
use solverbot_core::channel::Channel;
use solverbot_core::error::Error;
use solverbot_security::AllowlistPolicy;

/// Header Telegram echoes the registered `secret_token` in.
pub const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub assistant: Arc<Assistant>,
    pub channel: Arc<dyn Channel>,
    /// When set, updates without a matching secret header are rejected.
    pub secret_token: Option<String>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with the webhook and health routes.
pub fn build_router(state: SharedState, webhook_path: &str) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(webhook_path, post(webhook_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Wire storage, the reasoning provider, the formula renderer and the
/// uploader allowlist into an [`Assistant`].
pub async fn build_assistant(config: &AppConfig) -> Result<Assistant, Error> {
    let stores = solverbot_memory::open(
        &config.memory.backend,
        &config.memory.resolved_database_url(),
    )
    .await?;

    let provider = solverbot_providers::build_from_config(&config.provider)?;
    let policy = AllowlistPolicy::from_config(&config.telegram);
    if config.telegram.uploaders.is_empty() {
        warn!("No uploaders configured; every document upload will be refused");
    }

    let mut assistant = Assistant::new(
        config,
        stores.turns,
        stores.knowledge,
        Arc::new(provider),
        Arc::new(policy),
    );

    if let Some(renderer) = solverbot_providers::renderer_from_config(&config.render)? {
        assistant = assistant.with_renderer(Arc::new(renderer));
    }

    Ok(assistant)
}

/// Start the webhook server.
///
/// Registers the webhook with Telegram first when a public host is
/// configured.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let telegram = TelegramChannel::new(TelegramConfig::from_app(&config.telegram)?)?;
    match config.gateway.webhook_url() {
        Some(url) => {
            telegram
                .set_webhook(&url, config.gateway.secret_token.as_deref())
                .await?
        }
        None => warn!("No public host configured; skipping webhook registration"),
    }

    let assistant = build_assistant(&config).await?;

    let state = Arc::new(GatewayState {
        assistant: Arc::new(assistant),
        channel: Arc::new(telegram),
        secret_token: config.gateway.secret_token.clone(),
    });

    let app = build_router(state, &config.gateway.webhook_path);

    info!(addr = %addr, webhook_path = %config.gateway.webhook_path, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn webhook_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(expected) = state.secret_token.as_deref() {
        let provided = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if provided != Some(expected) {
            warn!("Webhook call with missing or wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    let message = match parse_update(&body) {
        Ok(Some(message)) => message,
        Ok(None) => return StatusCode::OK,
        Err(e) => {
            warn!(error = %e, body_len = body.len(), "Rejecting unreadable update");
            return StatusCode::BAD_REQUEST;
        }
    };

    debug!(chat_id = %message.chat_id, sender_id = %message.sender_id, "Update accepted");

    // Acknowledge now; Telegram redelivers updates that are not answered promptly.
    let assistant = state.assistant.clone();
    let channel = state.channel.clone();
    tokio::spawn(async move {
        let handled = assistant.handle(&message, channel.as_ref()).await;
        debug!(chat_id = %message.chat_id, outcome = ?handled, "Update handled");
    });

    StatusCode::OK
}
