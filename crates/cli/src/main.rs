//! SolverBot CLI — the main entry point.
//!
//! Commands:
//! - `serve`    — Start the Telegram webhook server
//! - `chat`     — Talk to the assistant from the terminal
//! - `ingest`   — Add a PDF to the knowledge store
//! - `webhook`  — Register or remove the Telegram webhook
//! - `migrate`  — Create the storage schema
//! - `config`   — Show, validate or locate the configuration
//! - `doctor`   — Diagnose configuration and connectivity

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "solverbot",
    about = "SolverBot — knowledge-augmented math & physics assistant",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.solverbot/config.toml)
    #[arg(short, long, global = true, env = "SOLVERBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the assistant in the terminal
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Ingest a PDF into the knowledge store
    Ingest {
        /// Path to the PDF
        path: PathBuf,

        /// Document id to store it under (defaults to the file name)
        #[arg(long)]
        id: Option<String>,
    },

    /// Manage the Telegram webhook registration
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },

    /// Create the storage schema and exit
    Migrate,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Diagnose configuration and connectivity
    Doctor,
}

#[derive(Subcommand)]
enum WebhookAction {
    /// Register the webhook (defaults to https://{public_host}{webhook_path})
    Set {
        #[arg(long)]
        url: Option<String>,
    },
    /// Remove the webhook
    Delete,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets included, as TOML)
    Show,
    /// Validate the configuration
    Validate,
    /// Print the default config file path
    Path,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Chat { message } => commands::chat::run(config_path, message).await?,
        Commands::Ingest { path, id } => commands::ingest::run(config_path, &path, id).await?,
        Commands::Webhook { action } => match action {
            WebhookAction::Set { url } => commands::webhook::set(config_path, url).await?,
            WebhookAction::Delete => commands::webhook::delete(config_path).await?,
        },
        Commands::Migrate => commands::migrate::run(config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
