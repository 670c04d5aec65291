//! Markdown rendering of a generated report.
//!
//! Every [`ReportSection`] is rendered in order, whether or not the report
//! capability filled it in. Missing fields show [`UNAVAILABLE`].

use crate::models::{ReportSection, SectionKind, UNAVAILABLE};
use crate::pipeline::ReportRun;
use crate::utils::slugify;
use chrono::{DateTime, Local};
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Render `run` as a Markdown document.
///
/// Scalar sections become a paragraph, list sections a bullet list, and the
/// discovered URLs close the document as a numbered source list.
pub fn report_to_markdown(run: &ReportRun, generated_at: &str) -> String {
    let mut md = String::new();
    md.push_str(&format!("# {}: Company Report\n\n", run.company));
    md.push_str(&format!("_Generated {}_\n\n", generated_at));

    for section in ReportSection::ALL {
        md.push_str(&format!("## {}\n\n", section.title()));
        match section.kind() {
            SectionKind::Scalar => {
                md.push_str(run.report.text_or(section.key(), UNAVAILABLE).trim());
                md.push_str("\n\n");
            }
            SectionKind::List => {
                let items = run.report.list_or_empty(section.key());
                if items.is_empty() {
                    md.push_str(UNAVAILABLE);
                    md.push('\n');
                }
                for item in items {
                    md.push_str(&format!("- {}\n", item.trim()));
                }
                md.push('\n');
            }
        }
    }

    md.push_str("## Sources\n\n");
    if run.sources.is_empty() {
        md.push_str("No sources were found.\n");
    }
    for (i, url) in run.sources.iter().enumerate() {
        md.push_str(&format!("{}. <{}>\n", i + 1, url));
    }
    md
}

/// Path of the Markdown report for `company` generated on `date`.
pub fn markdown_path(markdown_output_dir: &str, company: &str, date: &str) -> String {
    format!(
        "{}/{}_{}.md",
        markdown_output_dir.trim_end_matches('/'),
        slugify(company),
        date
    )
}

/// Write the Markdown report for `run` and return the file path.
#[instrument(level = "info", skip_all, fields(%markdown_output_dir, company = %run.company))]
pub async fn write_report(
    run: &ReportRun,
    markdown_output_dir: &str,
    generated: DateTime<Local>,
) -> Result<String, Box<dyn Error>> {
    let path = markdown_path(
        markdown_output_dir,
        &run.company,
        &generated.format("%Y-%m-%d").to_string(),
    );
    let md = report_to_markdown(run, &generated.format("%Y-%m-%d %H:%M:%S").to_string());

    fs::create_dir_all(markdown_output_dir).await?;
    fs::write(&path, md).await?;
    info!(path = %path, "Wrote Markdown report");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Report;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run_with(parameters: serde_json::Value, sources: &[&str]) -> ReportRun {
        ReportRun {
            company: "Acme Corp".into(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            scraped: sources.len(),
            context_chars: 0,
            report: serde_json::from_value::<Report>(json!({ "parameters": parameters })).unwrap(),
        }
    }

    #[test]
    fn test_full_report_layout() {
        let run = run_with(
            json!({
                "summary_and_key_insights": "Acme leads the anvil market.",
                "company_metrics": ["Revenue $1B", "5,000 employees"],
                "mission": "Deliver anvils."
            }),
            &["https://acme.example", "https://news.example/acme"],
        );
        let md = report_to_markdown(&run, "2026-10-16 09:00:00");

        assert!(md.starts_with("# Acme Corp: Company Report\n\n_Generated 2026-10-16 09:00:00_\n\n"));
        assert!(md.contains("## Summary and Key Insights\n\nAcme leads the anvil market.\n\n"));
        assert!(md.contains("## Company Metrics\n\n- Revenue $1B\n- 5,000 employees\n\n"));
        assert!(md.contains("## Company Mission\n\nDeliver anvils.\n\n"));
        assert!(md.ends_with("## Sources\n\n1. <https://acme.example>\n2. <https://news.example/acme>\n"));
    }

    #[test]
    fn test_missing_sections_render_unavailable() {
        let run = run_with(json!({}), &[]);
        let md = report_to_markdown(&run, "now");

        for section in ReportSection::ALL {
            let heading = format!("## {}\n\n{}\n", section.title(), UNAVAILABLE);
            assert!(md.contains(&heading), "missing placeholder for {}", section.title());
        }
        assert!(md.contains("No sources were found."));
    }

    #[test]
    fn test_section_order() {
        let md = report_to_markdown(&run_with(json!({}), &[]), "now");
        let positions: Vec<usize> = ReportSection::ALL
            .into_iter()
            .map(|s| md.find(&format!("## {}", s.title())).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_markdown_path() {
        assert_eq!(
            markdown_path("./reports/", "Acme Corp", "2026-10-16"),
            "./reports/acme-corp_2026-10-16.md"
        );
    }

    #[tokio::test]
    async fn test_write_report_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let out = out.to_str().unwrap();
        let run = run_with(json!({ "vision": "Anvils everywhere." }), &[]);

        let path = write_report(&run, out, Local::now()).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(path.contains("acme-corp_"));
        assert!(written.contains("## Company Vision\n\nAnvils everywhere."));
    }
}
