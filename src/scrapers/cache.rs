//! Process-lifetime memoization of scrape results.
//!
//! [`CachedScraper`] decorates any [`Scrape`] implementation. The key is the
//! URL exactly as discovered, the value the scraped text. Entries live as long
//! as the cache does; there is no eviction, since a run discovers a few dozen
//! URLs at most. Failed scrapes are cached as empty text as well.

use super::Scrape;
use crate::models::ScrapedDocument;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument};

/// Memoizing wrapper around a scraper.
pub struct CachedScraper<S> {
    inner: S,
    entries: Mutex<HashMap<String, String>>,
}

impl<S> CachedScraper<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of distinct URLs scraped so far.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<S> fmt::Debug for CachedScraper<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedScraper")
            .field("entries", &self.len())
            .finish()
    }
}

impl<S: Scrape> Scrape for CachedScraper<S> {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn scrape(&self, url: &str) -> ScrapedDocument {
        let hit = self.entries.lock().get(url).cloned();
        if let Some(text) = hit {
            debug!(chars = text.len(), "Scrape cache hit");
            return ScrapedDocument::new(url, text);
        }

        let doc = self.inner.scrape(url).await;
        self.entries
            .lock()
            .insert(url.to_string(), doc.text.clone());
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::PageScraper;
    use crate::scrapers::tests::FakeRenderer;

    fn cached(pages: &[(&str, &str)]) -> CachedScraper<PageScraper<FakeRenderer>> {
        CachedScraper::new(PageScraper::new(FakeRenderer::with_pages(
            pages.iter().copied(),
        )))
    }

    #[tokio::test]
    async fn test_second_scrape_is_served_from_cache() {
        let scraper = cached(&[("https://acme.example", "<p>Acme</p>")]);

        let first = scraper.scrape("https://acme.example").await;
        let second = scraper.scrape("https://acme.example").await;

        assert_eq!(first, second);
        assert_eq!(second.text, "Acme");
        assert_eq!(scraper.inner().renderer().render_count(), 1);
        assert_eq!(scraper.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_urls_render_separately() {
        let scraper = cached(&[
            ("https://a.example", "<p>A</p>"),
            ("https://b.example", "<p>B</p>"),
        ]);
        assert_eq!(scraper.scrape("https://a.example").await.text, "A");
        assert_eq!(scraper.scrape("https://b.example").await.text, "B");
        assert_eq!(scraper.inner().renderer().render_count(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_cached_as_empty() {
        let scraper = cached(&[]);
        assert!(scraper.is_empty());
        assert!(scraper.scrape("https://down.example").await.is_empty());
        assert!(scraper.scrape("https://down.example").await.is_empty());
        assert_eq!(scraper.inner().renderer().render_count(), 1);
        assert!(!scraper.is_empty());
    }
}
