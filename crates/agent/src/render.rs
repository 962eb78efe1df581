//! Reply rendering: plain text, or styled HTML plus a formula image.
//!
//! Replies without a `$` marker pass through untouched. Otherwise `**bold**`
//! pairs become `<b>` tags, HTML is escaped, `$` markers are stripped, and
//! the first non-empty `$…$` span is typeset by the formula renderer.

use solverbot_core::error::RenderError;
use solverbot_core::render::FormulaRenderer;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// What the channel should deliver for one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderedReply {
    /// Send as-is, no markup.
    Plain(String),
    /// Send `html` in HTML mode, then the image if one was produced.
    Rich { html: String, image: Option<Vec<u8>> },
}

pub struct ReplyRenderer {
    renderer: Option<Arc<dyn FormulaRenderer>>,
    timeout: Duration,
}

impl ReplyRenderer {
    pub fn new(renderer: Arc<dyn FormulaRenderer>) -> Self {
        Self {
            renderer: Some(renderer),
            timeout: Duration::from_secs(20),
        }
    }

    /// A renderer that styles text but never produces images.
    pub fn text_only() -> Self {
        Self {
            renderer: None,
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn render(&self, reply: &str) -> RenderedReply {
        if !reply.contains('$') {
            return RenderedReply::Plain(reply.to_string());
        }

        let html = to_html(reply);
        let image = match (first_formula(reply), &self.renderer) {
            (Some(formula), Some(renderer)) => self.render_formula(renderer.as_ref(), formula).await,
            (None, _) => {
                debug!("Reply has an unpaired '$'; no formula to render");
                None
            }
            (Some(_), None) => None,
        };

        RenderedReply::Rich { html, image }
    }

    async fn render_formula(&self, renderer: &dyn FormulaRenderer, formula: &str) -> Option<Vec<u8>> {
        let outcome = tokio::time::timeout(self.timeout, renderer.render(formula))
            .await
            .unwrap_or(Err(RenderError::Timeout(self.timeout.as_secs())));

        match outcome {
            Ok(image) => Some(image),
            Err(e) => {
                warn!(renderer = renderer.name(), error = %e, "Formula rendering failed; sending text only");
                None
            }
        }
    }
}

/// The first non-empty text enclosed by `$` markers, trimmed.
///
/// `$$x$$` yields `x` because the empty spans between doubled markers are
/// skipped. A lone `$` yields nothing.
pub fn first_formula(text: &str) -> Option<&str> {
    let segments: Vec<&str> = text.split('$').collect();
    if segments.len() < 3 {
        return None;
    }
    segments[1..segments.len() - 1]
        .iter()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
}

/// Escape the characters Telegram's HTML mode treats as markup.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape, turn `**x**` pairs into `<b>x</b>`, and strip `$` markers.
///
/// A trailing unpaired `**` is kept literally.
pub fn to_html(text: &str) -> String {
    let stripped = text.replace('$', "");
    let segments: Vec<&str> = stripped.split("**").collect();
    let markers = segments.len() - 1;
    let paired = markers - markers % 2;

    let mut out = String::with_capacity(stripped.len() + 16);
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(&escape_html(segment));
        if i < markers {
            if i < paired {
                out.push_str(if i % 2 == 0 { "<b>" } else { "</b>" });
            } else {
                out.push_str("**");
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedRenderer;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

    #[test]
    fn first_formula_cases() {
        assert_eq!(first_formula("so $E = mc^2$ holds"), Some("E = mc^2"));
        assert_eq!(first_formula("$$F = ma$$"), Some("F = ma"));
        assert_eq!(first_formula("$a$ and $b$"), Some("a"));
        assert_eq!(first_formula("costs $5"), None);
        assert_eq!(first_formula("$$"), None);
        assert_eq!(first_formula("no markers"), None);
    }

    #[test]
    fn html_conversion() {
        assert_eq!(to_html("**Answer**: $x = 2$"), "<b>Answer</b>: x = 2");
        assert_eq!(to_html("a < b && c > d $"), "a &lt; b &amp;&amp; c &gt; d ");
        assert_eq!(to_html("**one** and **two"), "<b>one</b> and **two");
    }

    #[tokio::test]
    async fn no_marker_is_plain_with_no_renderer_call() {
        let scripted = Arc::new(ScriptedRenderer::ok(PNG));
        let renderer = ReplyRenderer::new(scripted.clone());

        let out = renderer.render("The answer is **4**.").await;
        assert_eq!(out, RenderedReply::Plain("The answer is **4**.".into()));
        assert!(scripted.calls().is_empty());
    }

    #[tokio::test]
    async fn formula_is_rendered_once_with_the_delimited_text() {
        let scripted = Arc::new(ScriptedRenderer::ok(PNG));
        let renderer = ReplyRenderer::new(scripted.clone());

        let out = renderer
            .render("**Decay**: $A = A_0 (1/2)^{t/T}$ and $k$")
            .await;

        assert_eq!(
            out,
            RenderedReply::Rich {
                html: "<b>Decay</b>: A = A_0 (1/2)^{t/T} and k".into(),
                image: Some(PNG.to_vec()),
            }
        );
        assert_eq!(scripted.calls(), vec!["A = A_0 (1/2)^{t/T}".to_string()]);
    }

    #[tokio::test]
    async fn render_failure_degrades_to_styled_text() {
        let scripted = Arc::new(ScriptedRenderer::failing(RenderError::Status(502)));
        let renderer = ReplyRenderer::new(scripted.clone());

        let out = renderer.render("$x^2$").await;
        assert_eq!(
            out,
            RenderedReply::Rich {
                html: "x^2".into(),
                image: None,
            }
        );
        assert_eq!(scripted.calls().len(), 1);
    }

    #[tokio::test]
    async fn lone_marker_is_styled_without_renderer_call() {
        let scripted = Arc::new(ScriptedRenderer::ok(PNG));
        let renderer = ReplyRenderer::new(scripted.clone());

        let out = renderer.render("That costs $5").await;
        assert_eq!(
            out,
            RenderedReply::Rich {
                html: "That costs 5".into(),
                image: None,
            }
        );
        assert!(scripted.calls().is_empty());
    }

    #[tokio::test]
    async fn text_only_renderer_never_produces_images() {
        let out = ReplyRenderer::text_only().render("$y$").await;
        assert_eq!(
            out,
            RenderedReply::Rich {
                html: "y".into(),
                image: None,
            }
        );
    }
}
