//! JSON output of a generated report.
//!
//! # Output Structure
//!
//! ```text
//! json_output_dir/
//! ├── acme-corp_2026-10-16.json
//! └── globex_2026-10-16.json
//! ```
//!
//! Each file carries the company, the generation timestamp (RFC 3339), the
//! source URLs in discovery order and the raw report fields.

use crate::pipeline::ReportRun;
use crate::utils::slugify;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialized form of a [`ReportRun`].
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub company: &'a str,
    pub generated_at: String,
    pub sources: &'a [String],
    pub parameters: &'a BTreeMap<String, Value>,
}

impl<'a> ReportDocument<'a> {
    pub fn new(run: &'a ReportRun, generated: DateTime<Local>) -> Self {
        Self {
            company: &run.company,
            generated_at: generated.to_rfc3339(),
            sources: &run.sources,
            parameters: &run.report.parameters,
        }
    }
}

/// Write `run` to `{json_output_dir}/{slug}_{date}.json` and return the path.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir, company = %run.company))]
pub async fn write_report(
    run: &ReportRun,
    json_output_dir: &str,
    generated: DateTime<Local>,
) -> Result<String, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(&ReportDocument::new(run, generated))?;

    if let Err(e) = fs::create_dir_all(json_output_dir).await {
        error!(%json_output_dir, error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = format!(
        "{}/{}_{}.json",
        json_output_dir.trim_end_matches('/'),
        slugify(&run.company),
        generated.format("%Y-%m-%d")
    );
    fs::write(&path, json).await?;
    info!(path = %path, "Wrote JSON report");
    Ok(path)
}
