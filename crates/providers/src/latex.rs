//! CodeCogs-compatible formula renderer.
//!
//! `GET {endpoint}?latex=<markup>` answers with a PNG of the typeset formula.

use async_trait::async_trait;
use solverbot_core::error::RenderError;
use solverbot_core::render::FormulaRenderer;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://latex.codecogs.com/png.latex";

pub struct CodecogsRenderer {
    endpoint: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl CodecogsRenderer {
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self, RenderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| RenderError::Unreachable(format!("HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            timeout_secs,
            client,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> RenderError {
        if e.is_timeout() {
            RenderError::Timeout(self.timeout_secs)
        } else {
            RenderError::Unreachable(e.to_string())
        }
    }
}

/// Whether a response body is a raster image Telegram can show as a photo,
/// judged by signature or content type. SVG is rejected.
pub fn looks_like_image(content_type: Option<&str>, bytes: &[u8]) -> bool {
    if bytes.is_empty() || is_svg(bytes) {
        return false;
    }

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF];
    if bytes.starts_with(PNG)
        || bytes.starts_with(JPEG)
        || bytes.starts_with(b"GIF87a")
        || bytes.starts_with(b"GIF89a")
    {
        return true;
    }

    content_type.is_some_and(|ct| {
        let ct = ct.trim().to_ascii_lowercase();
        ct.starts_with("image/") && !ct.starts_with("image/svg")
    })
}

// An XML prolog or the root element itself, near the start.
fn is_svg(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]).to_ascii_lowercase();
    let head = head.trim_start();
    head.starts_with("<svg") || (head.starts_with("<?xml") && head.contains("<svg"))
}

#[async_trait]
impl FormulaRenderer for CodecogsRenderer {
    fn name(&self) -> &str {
        "codecogs"
    }

    async fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError> {
        debug!(chars = markup.chars().count(), "Rendering formula");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("latex", markup)])
            .header("Accept-Encoding", "identity")
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Formula endpoint returned error");
            return Err(RenderError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let bytes = response.bytes().await.map_err(|e| self.map_send_error(e))?;

        if !looks_like_image(content_type.as_deref(), &bytes) {
            return Err(RenderError::NotAnImage(
                content_type.unwrap_or_else(|| "no content type".into()),
            ));
        }

        Ok(bytes.to_vec())
    }
}
