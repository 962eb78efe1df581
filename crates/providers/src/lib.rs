//! Remote endpoint clients for SolverBot.
//!
//! - [`OpenAiCompatProvider`] implements `solverbot_core::Provider`
//! - [`CodecogsRenderer`] implements `solverbot_core::FormulaRenderer`

pub mod latex;
pub mod openai_compat;

pub use latex::CodecogsRenderer;
pub use openai_compat::OpenAiCompatProvider;

use solverbot_config::{ProviderConfig, RenderConfig};
use solverbot_core::error::{RenderError, UpstreamError};
use tracing::warn;

/// Build the reasoning provider described by `[provider]`.
pub fn build_from_config(config: &ProviderConfig) -> Result<OpenAiCompatProvider, UpstreamError> {
    if config.api_key.is_none() {
        warn!(api_url = %config.api_url, "No provider API key configured; sending unauthenticated requests");
    }

    let name = if config.api_url.contains("googleapis.com") {
        "gemini"
    } else {
        "openai_compat"
    };

    Ok(OpenAiCompatProvider::new(
        name,
        config.api_url.clone(),
        config.api_key.clone(),
        config.timeout_secs,
    )?
    .with_key_placement(config.key_placement))
}

/// Build the formula renderer described by `[render]`, or `None` when disabled.
pub fn renderer_from_config(config: &RenderConfig) -> Result<Option<CodecogsRenderer>, RenderError> {
    if !config.enabled {
        return Ok(None);
    }
    CodecogsRenderer::new(config.endpoint.clone(), config.timeout_secs).map(Some)
}
