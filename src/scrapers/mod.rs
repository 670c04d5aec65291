//! Page scraping for discovered URLs.
//!
//! Scraping runs in two layers:
//!
//! 1. **Rendering** ([`RenderPage`]): produce the fully rendered HTML of a URL.
//!    The production renderer is [`chrome::ChromeRenderer`], a headless
//!    Chromium that scrolls until lazily loaded content stops appearing.
//! 2. **Cleaning** ([`text::visible_text`]): strip structural noise (header,
//!    footer, navigation, scripts, styles) and normalize whitespace.
//!
//! [`PageScraper`] joins the two behind a `Result` boundary and then collapses
//! every [`ScrapeError`] into an empty document: one bad page never aborts a
//! run. [`cache::CachedScraper`] memoizes results per URL.
//!
//! # Submodules
//!
//! | Module | Role |
//! |--------|------|
//! | [`chrome`] | Browser discovery, launch and the scroll-to-bottom render loop |
//! | [`text`] | HTML noise stripping |
//! | [`cache`] | Process-lifetime memoization keyed by URL |

pub mod cache;
pub mod chrome;
pub mod text;

use crate::models::ScrapedDocument;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Everything that can go wrong while rendering one page.
#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Unsupported URL {0}: only http and https are scraped")]
    UnsupportedUrl(String),

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Browser protocol error: {0}")]
    Browser(#[from] chromiumoxide::error::CdpError),

    #[error("Timed out after {secs}s while {stage}")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("Element {selector:?} never appeared")]
    MissingElement { selector: String },

    #[error("Unexpected script result: {0}")]
    Script(#[from] serde_json::Error),
}

/// Produces the rendered HTML of a page.
pub trait RenderPage {
    async fn render(&self, url: &str) -> Result<String, ScrapeError>;
}

/// Turns a URL into a [`ScrapedDocument`]. Never fails.
pub trait Scrape {
    async fn scrape(&self, url: &str) -> ScrapedDocument;
}

/// Render-then-clean scraper over any [`RenderPage`] implementation.
#[derive(Debug)]
pub struct PageScraper<R> {
    renderer: R,
}

impl<R: RenderPage> PageScraper<R> {
    pub fn new(renderer: R) -> Self {
        Self { renderer }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Render and clean one page, surfacing the failure cause.
    pub async fn try_scrape(&self, url: &str) -> Result<ScrapedDocument, ScrapeError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ScrapeError::UnsupportedUrl(url.to_string()));
        }
        let html = self.renderer.render(url).await?;
        let text = text::visible_text(&html);
        Ok(ScrapedDocument::new(url, text))
    }
}

impl<R: RenderPage> Scrape for PageScraper<R> {
    /// Scrape one page; any failure yields an empty document.
    #[instrument(level = "info", skip_all, fields(%url))]
    async fn scrape(&self, url: &str) -> ScrapedDocument {
        let t0 = Instant::now();
        match self.try_scrape(url).await {
            Ok(doc) => {
                info!(
                    chars = doc.text.chars().count(),
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Scraped page"
                );
                if doc.is_empty() {
                    debug!("Page rendered but carried no visible text");
                }
                doc
            }
            Err(e) => {
                warn!(
                    error = %e,
                    elapsed_ms = t0.elapsed().as_millis() as u64,
                    "Scrape failed; page contributes nothing"
                );
                ScrapedDocument::empty(url)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves canned HTML per URL and counts renders; unknown URLs fail.
    #[derive(Default)]
    pub(crate) struct FakeRenderer {
        pub(crate) pages: HashMap<String, String>,
        pub(crate) renders: AtomicUsize,
    }

    impl FakeRenderer {
        pub(crate) fn with_pages<I, K, V>(pages: I) -> Self
        where
            I: IntoIterator<Item = (K, V)>,
            K: Into<String>,
            V: Into<String>,
        {
            Self {
                pages: pages
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
                renders: AtomicUsize::new(0),
            }
        }

        pub(crate) fn render_count(&self) -> usize {
            self.renders.load(Ordering::SeqCst)
        }
    }

    impl RenderPage for FakeRenderer {
        async fn render(&self, url: &str) -> Result<String, ScrapeError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            self.pages.get(url).cloned().ok_or(ScrapeError::Timeout {
                stage: "navigating",
                secs: 30,
            })
        }
    }

    #[tokio::test]
    async fn test_scrape_strips_noise() {
        let renderer = FakeRenderer::with_pages([(
            "https://acme.example",
            "<html><body><nav>Home | About</nav><main><p>Acme builds rockets.</p></main>\
             <footer>(c) Acme</footer></body></html>",
        )]);
        let scraper = PageScraper::new(renderer);
        let doc = scraper.scrape("https://acme.example").await;
        assert_eq!(doc.source_url, "https://acme.example");
        assert_eq!(doc.text, "Acme builds rockets.");
    }

    #[tokio::test]
    async fn test_scrape_failure_yields_empty_document() {
        let scraper = PageScraper::new(FakeRenderer::default());
        let doc = scraper.scrape("https://unreachable.invalid").await;
        assert!(doc.is_empty());
        assert_eq!(doc.source_url, "https://unreachable.invalid");
        assert_eq!(scraper.renderer().render_count(), 1);
    }

    #[tokio::test]
    async fn test_try_scrape_surfaces_cause() {
        let scraper = PageScraper::new(FakeRenderer::default());
        let err = scraper.try_scrape("https://unreachable.invalid").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_non_http_urls_are_not_rendered() {
        let scraper = PageScraper::new(FakeRenderer::default());
        let doc = scraper.scrape("ftp://files.example/report.pdf").await;
        assert!(doc.is_empty());
        assert_eq!(scraper.renderer().render_count(), 0);
    }
}
