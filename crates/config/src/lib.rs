//! Configuration loading, validation, and management for SolverBot.
//!
//! Loads configuration from `~/.solverbot/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.solverbot/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning endpoint settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Conversation memory storage
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Knowledge lookup tuning
    #[serde(default)]
    pub knowledge: KnowledgeConfig,

    /// Formula rendering endpoint
    #[serde(default)]
    pub render: RenderConfig,

    /// Telegram transport
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Webhook server
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Persona and user-visible texts
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

// ── Provider ─────────────────────────────────────────────────────────────

/// Where the API key travels on each reasoning request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPlacement {
    /// `Authorization: Bearer <key>`
    #[default]
    Bearer,
    /// `?key=<key>` query parameter
    Query,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible API (without `/chat/completions`)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub key_placement: KeyPlacement,
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_provider_timeout() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_provider_timeout(),
            key_placement: KeyPlacement::default(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .field("key_placement", &self.key_placement)
            .finish()
    }
}

// ── Memory ───────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "sqlite", "postgres" or "in_memory"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Connection string; SQLite defaults to `~/.solverbot/solverbot.sqlite`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    /// Number of recent turns replayed into each prompt
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_memory_backend() -> String {
    "sqlite".into()
}
fn default_history_limit() -> usize {
    20
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            database_url: None,
            history_limit: default_history_limit(),
        }
    }
}

impl std::fmt::Debug for MemoryConfig {
    // Connection strings usually embed a password.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryConfig")
            .field("backend", &self.backend)
            .field("database_url", &redact(&self.database_url))
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

impl MemoryConfig {
    /// The effective connection string for the configured backend.
    pub fn resolved_database_url(&self) -> String {
        match &self.database_url {
            Some(url) => url.clone(),
            None => format!(
                "sqlite://{}",
                AppConfig::config_dir().join("solverbot.sqlite").display()
            ),
        }
    }
}

// ── Knowledge ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Characters kept on each side of a match when excerpting
    #[serde(default = "default_excerpt_radius")]
    pub excerpt_radius: usize,
}

fn default_max_results() -> usize {
    5
}
fn default_excerpt_radius() -> usize {
    400
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            excerpt_radius: default_excerpt_radius(),
        }
    }
}

// ── Render ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_render_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_render_endpoint() -> String {
    "https://latex.codecogs.com/png.latex".into()
}
fn default_render_timeout() -> u64 {
    20
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_render_endpoint(),
            timeout_secs: default_render_timeout(),
        }
    }
}

// ── Telegram ─────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Sender IDs allowed to upload documents. Empty = nobody, ["*"] = everybody.
    #[serde(default)]
    pub uploaders: Vec<String>,

    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".into()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            uploaders: vec![],
            api_base: default_telegram_api_base(),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &redact(&self.bot_token))
            .field("uploaders", &self.uploaders)
            .field("api_base", &self.api_base)
            .finish()
    }
}

// ── Gateway ──────────────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    /// Externally reachable hostname used when registering the webhook
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_host: Option<String>,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` header value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_token: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_webhook_path() -> String {
    "/webhook".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
            public_host: None,
            secret_token: None,
        }
    }
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("webhook_path", &self.webhook_path)
            .field("public_host", &self.public_host)
            .field("secret_token", &redact(&self.secret_token))
            .finish()
    }
}

impl GatewayConfig {
    /// Full public webhook URL, if a public host is configured.
    pub fn webhook_url(&self) -> Option<String> {
        self.public_host
            .as_ref()
            .map(|host| format!("https://{}{}", host.trim_end_matches('/'), self.webhook_path))
    }
}

// ── Assistant ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Default system directive
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Whole-message greetings answered without a model call. Empty = disabled.
    #[serde(default)]
    pub greetings: Vec<String>,

    #[serde(default)]
    pub messages: MessagesConfig,
}

fn default_system_prompt() -> String {
    "You are a \u{201c}Smart Math & Physics Solver\u{201d} intelligent assistant with the ability \
     to accumulate and apply scientific knowledge from admin-provided PDFs."
        .into()
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            greetings: vec![],
            messages: MessagesConfig::default(),
        }
    }
}

/// User-visible texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_upload_denied")]
    pub upload_denied: String,

    #[serde(default = "default_upload_saved")]
    pub upload_saved: String,

    #[serde(default = "default_failure")]
    pub failure: String,

    #[serde(default = "default_greeting_reply")]
    pub greeting_reply: String,
}

fn default_upload_denied() -> String {
    "Sorry, only the administrator can upload PDFs for training.".into()
}
fn default_upload_saved() -> String {
    "PDF saved to the knowledge base.".into()
}
fn default_failure() -> String {
    "Sorry, I could not answer right now. Please try again.".into()
}
fn default_greeting_reply() -> String {
    "Hi! How can I help?".into()
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            upload_denied: default_upload_denied(),
            upload_saved: default_upload_saved(),
            failure: default_failure(),
            greeting_reply: default_greeting_reply(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from the default path (~/.solverbot/config.toml),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_dir().join("config.toml"))
    }

    /// Load from `path`, then apply environment overrides:
    ///
    /// - `TELEGRAM_BOT_TOKEN`
    /// - `ADMIN_ID` (comma-separated, appended to `telegram.uploaders`)
    /// - `PG_DSN` (switches the memory backend to postgres)
    /// - `SOLVERBOT_API_KEY` (highest priority), `GEMINI_API_KEY`
    /// - `SOLVERBOT_MODEL`
    /// - `PORT`
    /// - `RENDER_EXTERNAL_HOSTNAME`
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }

        if let Some(admins) = lookup("ADMIN_ID") {
            for id in admins.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                if !self.telegram.uploaders.iter().any(|u| u == id) {
                    self.telegram.uploaders.push(id.to_string());
                }
            }
        }

        if let Some(dsn) = lookup("PG_DSN") {
            self.memory.backend = "postgres".into();
            self.memory.database_url = Some(dsn);
        }

        if let Some(key) = lookup("SOLVERBOT_API_KEY").or_else(|| lookup("GEMINI_API_KEY")) {
            self.provider.api_key = Some(key);
        }

        if let Some(model) = lookup("SOLVERBOT_MODEL") {
            self.provider.model = model;
        }

        if let Some(port) = lookup("PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("PORT must be a port number, got '{port}'"))
            })?;
        }

        if let Some(host) = lookup("RENDER_EXTERNAL_HOSTNAME") {
            self.gateway.public_host = Some(host);
        }

        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".solverbot")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.memory.history_limit == 0 {
            return Err(ConfigError::ValidationError(
                "memory.history_limit must be at least 1".into(),
            ));
        }

        if !matches!(
            self.memory.backend.as_str(),
            "sqlite" | "postgres" | "in_memory"
        ) {
            return Err(ConfigError::ValidationError(format!(
                "memory.backend must be sqlite, postgres or in_memory (got '{}')",
                self.memory.backend
            )));
        }

        if self.knowledge.max_results == 0 {
            return Err(ConfigError::ValidationError(
                "knowledge.max_results must be at least 1".into(),
            ));
        }

        if !self.gateway.webhook_path.starts_with('/') {
            return Err(ConfigError::ValidationError(
                "gateway.webhook_path must start with '/'".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.memory.history_limit, 20);
        assert_eq!(config.knowledge.max_results, 5);
        assert!((config.provider.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.gateway.webhook_path, "/webhook");
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.provider.model, config.provider.model);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.provider.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_history_limit_rejected() {
        let mut config = AppConfig::default();
        config.memory.history_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_backend_rejected() {
        let mut config = AppConfig::default();
        config.memory.backend = "redis".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.memory.backend, "sqlite");
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[provider]
model = "gpt-4o-mini"
key_placement = "query"

[telegram]
uploaders = ["1001"]

[assistant]
greetings = ["hi", "hello"]

[assistant.messages]
failure = "Oops"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.key_placement, KeyPlacement::Query);
        assert_eq!(config.telegram.uploaders, vec!["1001".to_string()]);
        assert_eq!(config.assistant.greetings.len(), 2);
        assert_eq!(config.assistant.messages.failure, "Oops");
        // untouched fields keep their defaults
        assert_eq!(config.assistant.messages.upload_saved, default_upload_saved());
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "provider = 3").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("TELEGRAM_BOT_TOKEN", "123:abc"),
                ("ADMIN_ID", "42, 43"),
                ("PG_DSN", "postgresql://u:p@localhost/db"),
                ("GEMINI_API_KEY", "g-key"),
                ("PORT", "9000"),
                ("RENDER_EXTERNAL_HOSTNAME", "bot.example.com"),
            ]))
            .unwrap();

        assert_eq!(config.telegram.bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.telegram.uploaders, vec!["42", "43"]);
        assert_eq!(config.memory.backend, "postgres");
        assert_eq!(config.provider.api_key.as_deref(), Some("g-key"));
        assert_eq!(config.gateway.port, 9000);
        assert_eq!(
            config.gateway.webhook_url().as_deref(),
            Some("https://bot.example.com/webhook")
        );
    }

    #[test]
    fn solverbot_key_wins_over_gemini_key() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("SOLVERBOT_API_KEY", "s"), ("GEMINI_API_KEY", "g")]))
            .unwrap();
        assert_eq!(config.provider.api_key.as_deref(), Some("s"));
    }

    #[test]
    fn bad_port_rejected() {
        let mut config = AppConfig::default();
        assert!(config.apply_env(env(&[("PORT", "eighty")])).is_err());
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.provider.api_key = Some("super-secret".into());
        config.telegram.bot_token = Some("bot-secret".into());
        config.memory.database_url = Some("postgresql://u:pw@h/db".into());
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(!dbg.contains("bot-secret"));
        assert!(!dbg.contains("pw@h"));
        assert!(dbg.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("gemini-2.5-flash"));
        assert!(toml_str.contains("/webhook"));
    }
}
