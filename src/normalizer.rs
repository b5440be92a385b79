//! Best-effort HTML normalization: strip non-content chrome, convert the rest
//! to link-preserving markdown, and optionally truncate to a token budget.

use crate::extractor::Backend;
use crate::tokens;
use htmd::HtmlToMarkdown;
use scraper::{Html, Selector};
use tracing::warn;

/// Elements dropped wholesale before text conversion.
const SKIP_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "object", "embed", "svg", "canvas", "form",
    "button", "select", "nav", "header", "footer", "aside",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Converts HTML to condensed markdown. Never fails: if conversion does,
    /// the failure is logged and the raw input is returned as-is.
    pub fn normalize(&self, html: &str) -> String {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(SKIP_TAGS.to_vec())
            .build();

        match converter.convert(html) {
            Ok(markdown) => markdown,
            Err(e) => {
                warn!(error = %e, "HTML to markdown conversion failed, using raw content");
                html.to_string()
            }
        }
    }

    /// Normalizes and, when a budget is given, prefix-truncates to it using
    /// the tokenizer matched to the target backend.
    pub fn normalize_for_backend(
        &self,
        html: &str,
        backend: Backend,
        max_tokens: Option<usize>,
    ) -> String {
        let text = self.normalize(html);
        match max_tokens {
            Some(limit) => tokens::truncate_to_token_limit(&text, backend, limit),
            None => text,
        }
    }
}

/// Page title, if the document has one. Used for report cards only.
pub fn page_title(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    let title = document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>())?;
    let title = title.trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head><title>Test Shop</title><style>body { color: red; }</style></head>
          <body>
            <nav><a href="/home">Home</a></nav>
            <script>alert("tracking");</script>
            <h1>Catalog</h1>
            <p>Widget — <a href="/widget">$9.99</a></p>
            <footer>© Test Shop</footer>
          </body>
        </html>
    "#;

    #[test]
    fn strips_scripts_styles_and_chrome() {
        let text = Normalizer::new().normalize(PAGE);
        assert!(text.contains("Widget"));
        assert!(text.contains("$9.99"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color: red"));
        assert!(!text.contains("© Test Shop"));
    }

    #[test]
    fn preserves_links_in_markdown() {
        let text = Normalizer::new().normalize(PAGE);
        assert!(text.contains("/widget"));
    }

    #[test]
    fn truncation_applies_token_budget() {
        let html = format!("<html><body><p>{}</p></body></html>", "word ".repeat(500));
        let text =
            Normalizer::new().normalize_for_backend(&html, Backend::Gemini15Flash, Some(20));
        assert_eq!(tokens::count_tokens(&text, Backend::Gemini15Flash), 20);
    }

    #[test]
    fn extracts_page_title() {
        assert_eq!(page_title(PAGE).as_deref(), Some("Test Shop"));
        assert_eq!(page_title("<html><body></body></html>"), None);
    }
}
