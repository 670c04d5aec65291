//! YAML configuration for every pipeline stage.
//!
//! All fields carry defaults, so an absent or partial `config.yaml` is valid.
//! Secrets (API keys, assistant id) come from the CLI or the environment and
//! are never read from the file.
//!
//! ```yaml
//! search:
//!   results_per_query: 5
//!   excluded_domains: [youtube, youtu.be, vimeo]
//! scrape:
//!   scroll_settle_ms: 1500
//! pipeline:
//!   scrape_concurrency: 4
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing secret: {0}")]
    MissingSecret(&'static str),
}

/// Root of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub scrape: ScrapeConfig,
    pub context: ContextConfig,
    pub report: ReportConfig,
    pub pipeline: PipelineConfig,
}

/// URL discovery settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search API endpoint.
    pub endpoint: String,
    /// Topical suffixes appended to the company identifier, in query order.
    pub suffixes: Vec<String>,
    /// Result count requested per query.
    pub results_per_query: usize,
    /// Host patterns whose URLs are never scraped.
    pub excluded_domains: Vec<String>,
    /// `textFormat` query parameter.
    pub text_format: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.bing.microsoft.com/v7.0/search".to_string(),
            suffixes: [
                "",
                "company metrics",
                "mission and vision",
                "milestones",
                "financial performance",
                "products and services",
                "funding",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            results_per_query: 3,
            excluded_domains: vec!["youtube".to_string(), "youtu.be".to_string()],
            text_format: "HTML".to_string(),
        }
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScrapeConfig {
    /// Pause after each scroll before the page height is measured again.
    pub scroll_settle_ms: u64,
    /// Upper bound on scroll rounds for feeds that never stop growing.
    pub max_scroll_rounds: usize,
    pub navigation_timeout_secs: u64,
    /// Budget for one complete render, scrolling included.
    pub render_timeout_secs: u64,
    /// Selector that must exist before scrolling starts.
    pub ready_selector: String,
    pub headless: bool,
    /// Explicit browser binary; discovered or downloaded when unset.
    pub chrome_executable: Option<PathBuf>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            scroll_settle_ms: 1000,
            max_scroll_rounds: 50,
            navigation_timeout_secs: 30,
            render_timeout_secs: 180,
            ready_selector: "body".to_string(),
            headless: true,
            chrome_executable: None,
        }
    }
}

/// Corpus budgeting settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum token count handed to the report capability.
    pub token_ceiling: usize,
    /// Model whose tokenizer measures the corpus.
    pub tokenizer_model: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            token_ceiling: 120_000,
            tokenizer_model: "gpt-4o-mini".to_string(),
        }
    }
}

/// Report generation capability settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReportConfig {
    pub endpoint: String,
    pub capability_name: String,
    pub assistant_version: String,
    pub timeout_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://infer.conva.ai/v1/capability/invoke".to_string(),
            capability_name: "company_report_generation".to_string(),
            assistant_version: "5.0.0".to_string(),
            timeout_secs: 600,
        }
    }
}

/// Run-level settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pages rendered at once. `1` scrapes strictly one page at a time.
    pub scrape_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scrape_concurrency: 1,
        }
    }
}

impl Config {
    /// Parse and validate YAML text.
    pub fn from_yaml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit path, the per-user default path,
    /// or built-in defaults, in that order.
    #[instrument(level = "info", skip_all)]
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path().filter(|p| p.exists()),
        };

        let Some(path) = path else {
            info!("No config file found; using defaults");
            return Ok(Config::default());
        };

        let shown = path.display().to_string();
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: shown.clone(),
            source,
        })?;
        let config = Self::from_yaml(&text, &shown)?;
        info!(config_path = %shown, "Loaded configuration");
        debug!(?config, "Effective configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.search.suffixes.is_empty() {
            return Err(ConfigError::Invalid(
                "search.suffixes must contain at least one entry".into(),
            ));
        }
        if self.search.results_per_query == 0 {
            return Err(ConfigError::Invalid(
                "search.results_per_query must be at least 1".into(),
            ));
        }
        if self.pipeline.scrape_concurrency == 0 {
            return Err(ConfigError::Invalid(
                "pipeline.scrape_concurrency must be at least 1".into(),
            ));
        }
        if self.context.token_ceiling == 0 {
            return Err(ConfigError::Invalid(
                "context.token_ceiling must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// `<config_dir>/competitor_analyst/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("competitor_analyst").join("config.yaml"))
}
