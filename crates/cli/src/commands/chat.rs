//! `solverbot chat` — Interactive or single-message chat in the terminal.
//!
//! The terminal user is always allowed to upload, so `:upload <path>`
//! ingests a local PDF and arms priming exactly like an admin upload.

use solverbot_agent::Handled;
use solverbot_channels::CliChannel;
use solverbot_channels::cli::{CLI_SENDER_ID, parse_line};
use solverbot_config::AppConfig;
use std::io::Write;
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    // Check for API key early — give a clear error
    if config.provider.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GEMINI_API_KEY=...      (Google AI Studio)");
        eprintln!("    SOLVERBOT_API_KEY=...   (any OpenAI-compatible endpoint)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    if !config.telegram.uploaders.iter().any(|u| u == CLI_SENDER_ID) {
        config.telegram.uploaders.push(CLI_SENDER_ID.into());
    }

    let assistant = solverbot_gateway::build_assistant(&config).await?;
    let channel = CliChannel::new(std::env::current_dir()?.join("formulas"));

    if let Some(msg) = message {
        // Single message mode
        let outcome = assistant.handle(&parse_line(&msg), &channel).await;
        if outcome == Handled::Failed {
            return Err("The turn failed; run with -v for details".into());
        }
        return Ok(());
    }

    println!();
    println!("  SolverBot — Interactive Mode");
    println!();
    println!("  Model:     {}", config.provider.model);
    println!("  Memory:    {}", config.memory.backend);
    println!("  Formulas:  {}", if config.render.enabled { "rendered to ./formulas" } else { "off" });
    println!();
    println!("  Type your question and press Enter.");
    println!("  ':upload <file.pdf>' adds reference material; the next line primes the assistant.");
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut rx = channel.start();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(inbound) = rx.recv().await {
        match assistant.handle(&inbound, &channel).await {
            Handled::Primed => println!("  [system directive updated]"),
            Handled::Ignored => println!("  [ignored]"),
            _ => {}
        }
        println!();
        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}
