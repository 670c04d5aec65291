//! # Competitor Analyst
//!
//! Builds a competitive-intelligence report on a company from the open web:
//! it searches for pages about the company, renders and scrapes them in a
//! headless browser, fits the combined text into a model's token budget and
//! asks a hosted report capability to turn it into a structured report.
//!
//! ## Usage
//!
//! ```sh
//! competitor_analyst "Acme Corp" -m ./reports -j ./json
//! ```
//!
//! ## Architecture
//!
//! Each company runs through the same pipeline:
//! 1. **Discovery**: One search per topical suffix, merged and de-duplicated
//! 2. **Scraping**: Headless Chromium renders each URL (cached per process)
//! 3. **Context**: Page texts are joined, brace-escaped and trimmed to budget
//! 4. **Generation**: The report capability returns the report fields
//! 5. **Output**: Markdown (and optionally JSON) files per company

use chrono::Local;
use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cli;
mod config;
mod context;
mod discovery;
mod models;
mod outputs;
mod pipeline;
mod progress;
mod scrapers;
mod utils;

use api::CapabilityClient;
use cli::Cli;
use config::{Config, ConfigError};
use context::Tiktoken;
use discovery::BingSearch;
use outputs::{json, markdown};
use pipeline::Pipeline;
use progress::TracingProgress;
use scrapers::PageScraper;
use scrapers::cache::CachedScraper;
use scrapers::chrome::ChromeRenderer;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("competitor_analyst starting up");

    let args = Cli::parse();
    debug!(companies = ?args.companies, markdown_output_dir = %args.markdown_output_dir, json_output_dir = ?args.json_output_dir, "Parsed CLI arguments");

    let config = Config::load(args.config.as_deref())?;

    let search_api_key = args
        .search_api_key
        .clone()
        .ok_or(ConfigError::MissingSecret("--search-api-key / BING_SEARCH_API_KEY"))?;
    let report_api_key = args
        .report_api_key
        .clone()
        .ok_or(ConfigError::MissingSecret("--report-api-key / CONVA_API_KEY"))?;
    let assistant_id = args
        .assistant_id
        .clone()
        .ok_or(ConfigError::MissingSecret("--assistant-id / CONVA_ASSISTANT_ID"))?;

    // Early check: ensure output dirs are writable before spending minutes on a run
    if let Err(e) = ensure_writable_dir(&args.markdown_output_dir).await {
        error!(
            path = %args.markdown_output_dir,
            error = %e,
            "Markdown output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable");
            return Err(e);
        }
    }

    let tokens = Tiktoken::for_model(&config.context.tokenizer_model)?;
    info!(model = %tokens.model(), ceiling = config.context.token_ceiling, "Tokenizer ready");

    let search = BingSearch::new(&config.search, search_api_key);
    let scraper = CachedScraper::new(PageScraper::new(ChromeRenderer::new(config.scrape.clone())));
    let reporter = CapabilityClient::new(&config.report, report_api_key, assistant_id)?;
    let pipeline = Pipeline::new(config, search, scraper, reporter, tokens);

    let companies: Vec<&str> = args
        .companies
        .iter()
        .map(|c| c.trim())
        .filter(|c| {
            if c.is_empty() {
                warn!("Skipping blank company argument");
            }
            !c.is_empty()
        })
        .collect();

    let mut failed = 0usize;
    for company in &companies {
        info!(company = %company, "Starting report");
        let run = match pipeline.run(company, &TracingProgress).await {
            Ok(run) => run,
            Err(e) => {
                error!(company = %company, error = %e, "Report failed");
                failed += 1;
                continue;
            }
        };

        let generated = Local::now();
        if let Err(e) = markdown::write_report(&run, &args.markdown_output_dir, generated).await {
            error!(company = %company, error = %e, "Failed writing Markdown");
            failed += 1;
            continue;
        }
        if let Some(dir) = &args.json_output_dir {
            if let Err(e) = json::write_report(&run, dir, generated).await {
                error!(company = %company, error = %e, "Failed writing JSON");
                failed += 1;
                continue;
            }
        }
        info!(
            company = %company,
            sources = run.sources.len(),
            scraped = run.scraped,
            context_chars = run.context_chars,
            cached_pages = pipeline.scraper().len(),
            "Report complete"
        );
    }

    pipeline.scraper().inner().renderer().shutdown().await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        reports = companies.len() - failed,
        failed,
        "Execution complete"
    );

    if failed > 0 {
        return Err(format!("{} of {} reports failed", failed, companies.len()).into());
    }
    Ok(())
}
