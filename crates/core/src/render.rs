//! Formula renderer trait — converts markup (e.g. LaTeX) into an image.

use async_trait::async_trait;

use crate::error::RenderError;

#[async_trait]
pub trait FormulaRenderer: Send + Sync {
    fn name(&self) -> &str;

    /// Render `markup` and return the raw image bytes.
    async fn render(&self, markup: &str) -> std::result::Result<Vec<u8>, RenderError>;
}
