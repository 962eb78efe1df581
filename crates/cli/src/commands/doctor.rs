//! `solverbot doctor` — Diagnose configuration and connectivity.

use solverbot_channels::{TelegramChannel, TelegramConfig};
use solverbot_core::provider::Provider;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("SolverBot Doctor — System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ok    Config valid");
            config
        }
        Err(e) => {
            println!("  FAIL  {e}");
            println!("\n  1 issue found. Fix the config first.");
            return Ok(());
        }
    };

    // Storage
    match solverbot_memory::open(
        &config.memory.backend,
        &config.memory.resolved_database_url(),
    )
    .await
    {
        Ok(_) => println!("  ok    Storage ({}) reachable", config.memory.backend),
        Err(e) => {
            println!("  FAIL  Storage: {e}");
            issues += 1;
        }
    }

    // Reasoning endpoint
    if config.provider.api_key.is_none() {
        println!("  warn  No provider API key configured");
        issues += 1;
    }
    match solverbot_providers::build_from_config(&config.provider) {
        Ok(provider) => match provider.health_check().await {
            Ok(true) => println!("  ok    Reasoning endpoint ({}) answered", provider.name()),
            Ok(false) => {
                println!("  FAIL  Reasoning endpoint rejected the request (check the API key)");
                issues += 1;
            }
            Err(e) => {
                println!("  FAIL  Reasoning endpoint: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  FAIL  Provider: {e}");
            issues += 1;
        }
    }

    // Telegram
    match TelegramConfig::from_app(&config.telegram).and_then(TelegramChannel::new) {
        Ok(telegram) => match telegram.get_me().await {
            Ok(username) => println!("  ok    Telegram bot @{username}"),
            Err(e) => {
                println!("  FAIL  Telegram: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  warn  Telegram: {e}");
            issues += 1;
        }
    }

    if config.telegram.uploaders.is_empty() {
        println!("  warn  No uploaders configured (set ADMIN_ID)");
        issues += 1;
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
