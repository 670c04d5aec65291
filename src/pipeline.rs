//! End-to-end report run: discover → scrape → assemble → trim → generate.
//!
//! Every collaborator is injected, including the scrape cache, so one
//! [`Pipeline`] can serve several runs while each run starts from a clean
//! corpus and fresh progress state.

use crate::api::{GenerateReport, ReportError, ReportRequest};
use crate::config::Config;
use crate::context::{TokenCounter, build_context};
use crate::discovery::{SearchApi, SearchError, discover_urls};
use crate::models::{Report, ScrapedDocument};
use crate::progress::{ProgressSink, ProgressTracker};
use crate::scrapers::Scrape;
use futures::stream::{self, StreamExt};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Failures that abort a run. Scrape failures never appear here.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("URL discovery failed: {0}")]
    Discovery(#[from] SearchError),

    #[error("Report generation failed: {0}")]
    Report(#[from] ReportError),
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct ReportRun {
    pub company: String,
    /// Discovered URLs in discovery order.
    pub sources: Vec<String>,
    /// URLs whose scrape produced text.
    pub scraped: usize,
    /// Characters of context handed to the report capability.
    pub context_chars: usize,
    pub report: Report,
}

/// Wires the pipeline stages together.
#[derive(Debug)]
pub struct Pipeline<S, C, G, T> {
    config: Config,
    search: S,
    scraper: C,
    reporter: G,
    tokens: T,
}

impl<S, C, G, T> Pipeline<S, C, G, T>
where
    S: SearchApi,
    C: Scrape,
    G: GenerateReport,
    T: TokenCounter,
{
    pub fn new(config: Config, search: S, scraper: C, reporter: G, tokens: T) -> Self {
        Self {
            config,
            search,
            scraper,
            reporter,
            tokens,
        }
    }

    pub fn scraper(&self) -> &C {
        &self.scraper
    }

    /// Produce a report for `company`.
    ///
    /// # Errors
    ///
    /// Discovery and generation failures abort the run; nothing partial is
    /// returned. Pages that fail to scrape only thin out the context.
    #[instrument(level = "info", skip(self, sink))]
    pub async fn run<P: ProgressSink + ?Sized>(
        &self,
        company: &str,
        sink: &P,
    ) -> Result<ReportRun, PipelineError> {
        let t0 = Instant::now();
        let mut progress = ProgressTracker::new(&self.config.search.suffixes);
        sink.emit(progress.started());

        let urls = discover_urls(&self.search, company, &self.config.search).await?;
        sink.emit(progress.discovered(urls.len()));
        if urls.is_empty() {
            warn!("Search returned no usable URLs; the report will have no sources");
        }

        let documents = self.scrape_all(&urls, &mut progress, sink).await;
        let scraped = documents.iter().filter(|d| !d.is_empty()).count();
        info!(
            discovered = urls.len(),
            scraped,
            failed = urls.len() - scraped,
            "Scraping complete"
        );

        let context = build_context(&documents, self.config.context.token_ceiling, &self.tokens);
        if context.is_empty() {
            warn!("No page produced text; generating from an empty context");
        }

        sink.emit(progress.generating());
        let request = ReportRequest::for_company(company, context, &self.config.report);
        let context_chars = request.context_chars();
        let report = self.reporter.generate(&request).await?;
        sink.emit(progress.completed());

        let missing = report.missing_sections();
        if !missing.is_empty() {
            warn!(missing = ?missing, "Report is missing sections");
        }
        info!(
            elapsed_secs = t0.elapsed().as_secs(),
            context_chars,
            "Run complete"
        );

        Ok(ReportRun {
            company: company.to_string(),
            sources: urls,
            scraped,
            context_chars,
            report,
        })
    }

    /// Scrape `urls` with bounded concurrency, returning documents in input order.
    async fn scrape_all<P: ProgressSink + ?Sized>(
        &self,
        urls: &[String],
        progress: &mut ProgressTracker<'_>,
        sink: &P,
    ) -> Vec<ScrapedDocument> {
        stream::iter(urls)
            .map(|url| self.scraper.scrape(url))
            .buffered(self.config.pipeline.scrape_concurrency.max(1))
            .enumerate()
            .map(|(index, doc)| {
                sink.emit(progress.researching(index));
                doc
            })
            .collect::<Vec<_>>()
            .await
    }
}
