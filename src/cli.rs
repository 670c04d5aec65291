//! Command-line interface definitions for Competitor Analyst.
//!
//! Secrets can be provided via flags or environment variables; everything else
//! tunable lives in the YAML config file (see [`crate::config`]).

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the Competitor Analyst application.
///
/// # Examples
///
/// ```sh
/// # One report, Markdown into ./reports
/// competitor_analyst "Acme Corp"
///
/// # Several companies, JSON alongside Markdown
/// competitor_analyst "Acme Corp" globex.com -m ./md -j ./json
///
/// # Explicit config file
/// competitor_analyst "Acme Corp" -c ./config.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Company names or URLs; each one produces its own report
    #[arg(required = true)]
    pub companies: Vec<String>,

    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output directory for the Markdown reports
    #[arg(short, long, default_value = "./reports")]
    pub markdown_output_dir: String,

    /// Output directory for the JSON reports (skipped when absent)
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Search API subscription key
    #[arg(long, env = "BING_SEARCH_API_KEY", hide_env_values = true)]
    pub search_api_key: Option<String>,

    /// Report generation API key
    #[arg(long, env = "CONVA_API_KEY", hide_env_values = true)]
    pub report_api_key: Option<String>,

    /// Assistant id the report capability belongs to
    #[arg(long, env = "CONVA_ASSISTANT_ID")]
    pub assistant_id: Option<String>,
}
