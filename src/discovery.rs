//! Search-driven URL discovery.
//!
//! One search request is issued per topical suffix. Results are merged in
//! first-seen order (suffix order, then rank within a suffix), duplicates are
//! dropped, and URLs from excluded domains (video hosting by default) never
//! make it into the list.
//!
//! Any search failure aborts discovery: a report built from a fraction of its
//! sources is not worth producing.

use crate::config::SearchConfig;
use crate::models::{SearchQuery, SearchResponse};
use crate::utils::truncate_for_log;
use itertools::Itertools;
use reqwest::Client;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use url::Url;

/// Header carrying the search API subscription key.
const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Errors that abort URL discovery.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search request for {query:?} failed: {source}")]
    Http {
        query: String,
        source: reqwest::Error,
    },

    #[error("Search API returned {status} for {query:?}: {body}")]
    Status {
        query: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Malformed search payload for {query:?}: {source}")]
    Payload {
        query: String,
        source: serde_json::Error,
    },
}

/// A search backend returning result URLs in rank order.
pub trait SearchApi {
    async fn search(&self, query: &SearchQuery, count: usize) -> Result<Vec<String>, SearchError>;
}

/// Bing Web Search v7 client.
#[derive(Debug, Clone)]
pub struct BingSearch {
    client: Client,
    endpoint: String,
    api_key: String,
    text_format: String,
}

impl BingSearch {
    pub fn new(config: &SearchConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: config.endpoint.clone(),
            api_key: api_key.into(),
            text_format: config.text_format.clone(),
        }
    }
}

impl SearchApi for BingSearch {
    #[instrument(level = "info", skip_all, fields(query = %query.text()))]
    async fn search(&self, query: &SearchQuery, count: usize) -> Result<Vec<String>, SearchError> {
        let text = query.text();
        let count = count.to_string();
        let t0 = Instant::now();

        let response = self
            .client
            .get(&self.endpoint)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .query(&[
                ("q", text.as_str()),
                ("textFormat", self.text_format.as_str()),
                ("count", count.as_str()),
            ])
            .send()
            .await
            .map_err(|source| SearchError::Http {
                query: text.clone(),
                source,
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|source| SearchError::Http {
            query: text.clone(),
            source,
        })?;

        if !status.is_success() {
            error!(%status, body = %truncate_for_log(&body, 300), "Search API returned an error");
            return Err(SearchError::Status {
                query: text,
                status,
                body: truncate_for_log(&body, 300),
            });
        }

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|source| SearchError::Payload {
                query: text.clone(),
                source,
            })?;

        let urls: Vec<String> = parsed
            .web_pages
            .value
            .into_iter()
            .map(|page| page.url)
            .collect();
        debug!(
            count = urls.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Search round complete"
        );
        Ok(urls)
    }
}

/// Whether `url` belongs to one of the excluded domain patterns.
///
/// Patterns are matched against the host; URLs that do not parse are matched
/// on their raw text.
pub fn is_excluded(url: &str, excluded_domains: &[String]) -> bool {
    let haystack = match Url::parse(url) {
        Ok(parsed) => parsed.host_str().unwrap_or(url).to_ascii_lowercase(),
        Err(_) => url.to_ascii_lowercase(),
    };
    excluded_domains
        .iter()
        .any(|pattern| haystack.contains(&pattern.to_ascii_lowercase()))
}

/// Merge per-suffix result lists into one ordered, duplicate-free list.
pub fn merge_results<I>(batches: I, excluded_domains: &[String]) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    batches
        .into_iter()
        .flatten()
        .filter(|url| !is_excluded(url, excluded_domains))
        .unique()
        .collect()
}

/// Run one search per suffix and merge the results.
///
/// # Errors
///
/// The first [`SearchError`] aborts discovery; no partial list is returned.
#[instrument(level = "info", skip(api, config))]
pub async fn discover_urls<S: SearchApi>(
    api: &S,
    company: &str,
    config: &SearchConfig,
) -> Result<Vec<String>, SearchError> {
    let mut batches = Vec::with_capacity(config.suffixes.len());
    for suffix in &config.suffixes {
        let query = SearchQuery::new(company, suffix.as_str());
        let urls = api.search(&query, config.results_per_query).await?;
        debug!(suffix = %suffix, urls = ?urls, "Search results");
        batches.push(urls);
    }

    let raw_count: usize = batches.iter().map(Vec::len).sum();
    let urls = merge_results(batches, &config.excluded_domains);
    info!(
        raw = raw_count,
        unique = urls.len(),
        "Discovered candidate URLs"
    );
    Ok(urls)
}
