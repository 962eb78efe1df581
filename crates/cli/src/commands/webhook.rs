//! `solverbot webhook` — Register or remove the Telegram webhook.

use solverbot_channels::{TelegramChannel, TelegramConfig};
use solverbot_config::AppConfig;
use std::path::Path;

fn telegram(config: &AppConfig) -> Result<TelegramChannel, Box<dyn std::error::Error>> {
    Ok(TelegramChannel::new(TelegramConfig::from_app(&config.telegram)?)?)
}

pub async fn set(
    config_path: Option<&Path>,
    url: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    let url = url
        .or_else(|| config.gateway.webhook_url())
        .ok_or("No webhook URL: pass --url or set gateway.public_host")?;

    telegram(&config)?
        .set_webhook(&url, config.gateway.secret_token.as_deref())
        .await?;

    println!("Webhook set to {url}");
    Ok(())
}

pub async fn delete(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    telegram(&config)?.delete_webhook().await?;
    println!("Webhook deleted");
    Ok(())
}
