//! `solverbot serve` — Start the webhook server.

use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    if config.telegram.bot_token.is_none() {
        return Err("No Telegram bot token configured (set TELEGRAM_BOT_TOKEN)".into());
    }

    println!("SolverBot Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!(
        "   Webhook:   {}",
        config
            .gateway
            .webhook_url()
            .unwrap_or_else(|| format!("{} (not registered)", config.gateway.webhook_path))
    );
    println!("   Memory:    {}", config.memory.backend);
    println!("   Uploaders: {}", config.telegram.uploaders.len());

    solverbot_gateway::start(config).await?;

    Ok(())
}
