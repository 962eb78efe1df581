//! `solverbot config` — Configuration management commands.

use solverbot_config::AppConfig;
use std::path::Path;

pub async fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Validating configuration...");

    match super::load_config(config_path) {
        Ok(config) => {
            println!("   Config parsed successfully");

            let mut warnings = Vec::new();

            if config.provider.api_key.is_none() {
                warnings.push("No API key set (set GEMINI_API_KEY or SOLVERBOT_API_KEY)");
            }

            if config.telegram.bot_token.is_none() {
                warnings.push("No Telegram bot token set (set TELEGRAM_BOT_TOKEN)");
            }

            if config.telegram.uploaders.is_empty() {
                warnings.push("No uploaders configured; every PDF upload will be refused");
            }

            if config.gateway.public_host.is_none() {
                warnings.push("No public host; `serve` will not register the webhook");
            }

            if warnings.is_empty() {
                println!("   All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   warning: {w}");
                }
            }

            println!();
            println!("   Endpoint:  {}", config.provider.api_url);
            println!("   Model:     {}", config.provider.model);
            println!(
                "   Gateway:   {}:{}{}",
                config.gateway.host, config.gateway.port, config.gateway.webhook_path
            );
            println!("   Memory:    {}", config.memory.backend);
            println!("   Formulas:  {}", if config.render.enabled { config.render.endpoint.as_str() } else { "off" });
        }
        Err(e) => {
            println!("   Config error: {e}");
            return Err(e);
        }
    }

    Ok(())
}

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", default_path().display());
    Ok(())
}

pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = default_path();
    if path.exists() {
        println!("Config already exists at {}", path.display());
        return Ok(());
    }

    tokio::fs::create_dir_all(AppConfig::config_dir()).await?;
    tokio::fs::write(&path, AppConfig::default_toml()).await?;
    println!("Wrote default config to {}", path.display());
    Ok(())
}

fn default_path() -> std::path::PathBuf {
    AppConfig::config_dir().join("config.toml")
}
