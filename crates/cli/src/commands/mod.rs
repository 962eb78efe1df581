pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod ingest;
pub mod migrate;
pub mod serve;
pub mod webhook;

use solverbot_config::AppConfig;
use std::path::Path;

/// Load the config from `path` (or the default location) with env overrides.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => AppConfig::load_with_env(path),
        None => AppConfig::load(),
    };
    config.map_err(|e| format!("Failed to load config: {e}").into())
}
