//! Data models for search queries, scraped pages and generated reports.
//!
//! This module defines the core data structures used throughout the application:
//! - [`SearchQuery`]: One search round (company plus topical suffix)
//! - [`ScrapedDocument`]: Plain text captured from one discovered URL
//! - [`Report`]: Field mapping returned by the report generation capability
//! - [`ReportSection`]: The known report fields in presentation order
//! - Search API payload types: [`SearchResponse`], [`WebPages`], [`WebPage`]

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Placeholder rendered for report fields the remote service did not return.
pub const UNAVAILABLE: &str = "Unavailable";

/// A single search round: the company identifier plus one topical suffix.
///
/// An empty suffix stands for the bare company query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Company name or URL as typed by the user.
    pub base_term: String,
    /// Topical suffix such as `"funding"`, or empty.
    pub suffix: String,
}

impl SearchQuery {
    pub fn new(base_term: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            base_term: base_term.into(),
            suffix: suffix.into(),
        }
    }

    /// The text sent to the search API.
    pub fn text(&self) -> String {
        format!("{} {}", self.base_term.trim(), self.suffix.trim())
            .trim_end()
            .to_string()
    }
}

/// Plain text captured from one discovered page.
///
/// An empty `text` means the page could not be scraped. Callers treat it as
/// "no contribution" rather than an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedDocument {
    /// The URL the text was captured from.
    pub source_url: String,
    /// HTML-free, whitespace-normalized page text.
    pub text: String,
}

impl ScrapedDocument {
    pub fn new(source_url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            text: text.into(),
        }
    }

    /// Document produced for a page whose scrape failed.
    pub fn empty(source_url: impl Into<String>) -> Self {
        Self::new(source_url, String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Top-level search API payload.
///
/// Only the fields the discovery step reads are modelled; the rest of the
/// payload is ignored.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "webPages")]
    pub web_pages: WebPages,
}

/// The list of web page hits inside a [`SearchResponse`].
#[derive(Debug, Deserialize)]
pub struct WebPages {
    pub value: Vec<WebPage>,
}

/// One web page hit. Title, snippet and the other hit fields are ignored.
#[derive(Debug, Deserialize)]
pub struct WebPage {
    pub url: String,
}

/// Whether a report section holds a single paragraph or a list of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Scalar,
    List,
}

/// The report fields the capability is expected to return, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSection {
    SummaryAndKeyInsights,
    CompanyOverview,
    CompanyMetrics,
    Mission,
    Vision,
    Milestones,
    FinancialPerformance,
    ProductsAndServices,
    Funding,
}

impl ReportSection {
    pub const ALL: [ReportSection; 9] = [
        ReportSection::SummaryAndKeyInsights,
        ReportSection::CompanyOverview,
        ReportSection::CompanyMetrics,
        ReportSection::Mission,
        ReportSection::Vision,
        ReportSection::Milestones,
        ReportSection::FinancialPerformance,
        ReportSection::ProductsAndServices,
        ReportSection::Funding,
    ];

    /// Field name in the capability response.
    pub fn key(self) -> &'static str {
        match self {
            ReportSection::SummaryAndKeyInsights => "summary_and_key_insights",
            ReportSection::CompanyOverview => "company_overview",
            ReportSection::CompanyMetrics => "company_metrics",
            ReportSection::Mission => "mission",
            ReportSection::Vision => "vision",
            ReportSection::Milestones => "milestones",
            ReportSection::FinancialPerformance => "financial_performance",
            ReportSection::ProductsAndServices => "products_and_services",
            ReportSection::Funding => "funding",
        }
    }

    /// Heading used when rendering the section.
    pub fn title(self) -> &'static str {
        match self {
            ReportSection::SummaryAndKeyInsights => "Summary and Key Insights",
            ReportSection::CompanyOverview => "Company Overview",
            ReportSection::CompanyMetrics => "Company Metrics",
            ReportSection::Mission => "Company Mission",
            ReportSection::Vision => "Company Vision",
            ReportSection::Milestones => "Key Milestones",
            ReportSection::FinancialPerformance => "Financial Performance",
            ReportSection::ProductsAndServices => "Products and Services",
            ReportSection::Funding => "Funding Details",
        }
    }

    pub fn kind(self) -> SectionKind {
        match self {
            ReportSection::CompanyMetrics
            | ReportSection::Milestones
            | ReportSection::ProductsAndServices => SectionKind::List,
            _ => SectionKind::Scalar,
        }
    }
}

/// Structured report returned by the report generation capability.
///
/// Values are kept as raw JSON so that a field of an unexpected shape degrades
/// to a best-effort string instead of failing the whole run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Report {
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
}

impl Report {
    /// Scalar lookup with a default for missing, null or blank fields.
    pub fn text_or<'a>(&'a self, field: &str, default: &'a str) -> std::borrow::Cow<'a, str> {
        use std::borrow::Cow;
        match self.parameters.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Cow::Borrowed(s.as_str()),
            Some(Value::Array(items)) if !items.is_empty() => {
                Cow::Owned(items.iter().map(value_to_text).collect::<Vec<_>>().join("; "))
            }
            Some(v @ (Value::Number(_) | Value::Bool(_) | Value::Object(_))) => {
                Cow::Owned(value_to_text(v))
            }
            _ => Cow::Borrowed(default),
        }
    }

    /// List lookup; a missing field yields an empty list, a scalar yields one item.
    pub fn list_or_empty(&self, field: &str) -> Vec<String> {
        match self.parameters.get(field) {
            Some(Value::Array(items)) => items
                .iter()
                .map(value_to_text)
                .filter(|s| !s.trim().is_empty())
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(Value::String(s)) if s.trim().is_empty() => Vec::new(),
            Some(other) => vec![value_to_text(other)],
        }
    }

    /// Sections the capability did not fill in.
    pub fn missing_sections(&self) -> Vec<ReportSection> {
        ReportSection::ALL
            .into_iter()
            .filter(|section| match section.kind() {
                SectionKind::Scalar => self.text_or(section.key(), "").is_empty(),
                SectionKind::List => self.list_or_empty(section.key()).is_empty(),
            })
            .collect()
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(value: Value) -> Report {
        serde_json::from_value(json!({ "parameters": value })).unwrap()
    }

    #[test]
    fn test_query_text_with_suffix() {
        let q = SearchQuery::new("Acme Corp", "funding");
        assert_eq!(q.text(), "Acme Corp funding");
    }

    #[test]
    fn test_query_text_bare() {
        let q = SearchQuery::new("Acme Corp", "");
        assert_eq!(q.text(), "Acme Corp");
    }

    #[test]
    fn test_empty_document() {
        let doc = ScrapedDocument::empty("https://example.com");
        assert!(doc.is_empty());
        assert_eq!(doc.source_url, "https://example.com");
    }

    #[test]
    fn test_search_response_deserialization() {
        let json = r#"{
            "_type": "SearchResponse",
            "webPages": {
                "totalEstimatedMatches": 1000,
                "value": [
                    {"name": "Acme", "url": "https://acme.example"},
                    {"url": "https://news.example/acme"}
                ]
            }
        }"#;
        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.web_pages.value.len(), 2);
        assert_eq!(parsed.web_pages.value[0].url, "https://acme.example");
        assert_eq!(parsed.web_pages.value[1].url, "https://news.example/acme");
    }

    #[test]
    fn test_search_response_without_web_pages_is_rejected() {
        let json = r#"{"_type": "SearchResponse"}"#;
        assert!(serde_json::from_str::<SearchResponse>(json).is_err());
    }

    #[test]
    fn test_text_or_defaults_when_missing() {
        let r = report(json!({ "mission": "Build rockets" }));
        assert_eq!(r.text_or("mission", UNAVAILABLE), "Build rockets");
        assert_eq!(r.text_or("vision", UNAVAILABLE), UNAVAILABLE);
    }

    #[test]
    fn test_text_or_defaults_when_blank_or_null() {
        let r = report(json!({ "mission": "  ", "vision": null }));
        assert_eq!(r.text_or("mission", UNAVAILABLE), UNAVAILABLE);
        assert_eq!(r.text_or("vision", UNAVAILABLE), UNAVAILABLE);
    }

    #[test]
    fn test_list_or_empty() {
        let r = report(json!({
            "milestones": ["Founded 1999", 2004, ""],
            "funding": "Series B"
        }));
        assert_eq!(r.list_or_empty("milestones"), vec!["Founded 1999", "2004"]);
        assert_eq!(r.list_or_empty("funding"), vec!["Series B"]);
        assert!(r.list_or_empty("company_metrics").is_empty());
    }

    #[test]
    fn test_missing_sections() {
        let r = report(json!({
            "summary_and_key_insights": "Summary",
            "company_metrics": ["ARR $10M"],
        }));
        let missing = r.missing_sections();
        assert_eq!(missing.len(), 7);
        assert!(!missing.contains(&ReportSection::SummaryAndKeyInsights));
        assert!(!missing.contains(&ReportSection::CompanyMetrics));
        assert!(missing.contains(&ReportSection::Funding));
    }

    #[test]
    fn test_section_kinds() {
        let lists: Vec<_> = ReportSection::ALL
            .into_iter()
            .filter(|s| s.kind() == SectionKind::List)
            .map(|s| s.key())
            .collect();
        assert_eq!(
            lists,
            vec!["company_metrics", "milestones", "products_and_services"]
        );
    }
}
