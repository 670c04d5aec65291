//! Report generation capability client.
//!
//! The pipeline hands the remote capability an instruction naming the company
//! and a context mapping whose single key (the capability name) carries the
//! trimmed corpus. The capability answers with a field mapping that becomes a
//! [`Report`].
//!
//! # Architecture
//!
//! - [`GenerateReport`]: Core trait defining report generation
//! - [`ReportRequest`]: Everything sent for one generation call
//! - [`CapabilityClient`]: HTTP implementation with a hard timeout
//!
//! Generation is slow (minutes for a large corpus), so the client waits up to
//! the configured timeout (600 seconds by default) and then fails. There is no
//! retry: a failed or timed-out generation fails the run.

use crate::config::ReportConfig;
use crate::models::Report;
use crate::utils::truncate_for_log;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, instrument};

/// Errors that fail report generation.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Report generation timed out after {0}s")]
    Timeout(u64),

    #[error("Report request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Report capability returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Malformed report payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// One invocation of the report generation capability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRequest {
    /// Natural-language instruction naming the company.
    pub query: String,
    pub capability_name: String,
    /// Server-side time limit in seconds.
    pub timeout: u64,
    pub stream: bool,
    /// Single entry: capability name → trimmed, escaped corpus.
    pub capability_context: BTreeMap<String, String>,
}

impl ReportRequest {
    /// Build the request for `company` with `corpus` as the capability context.
    pub fn for_company(company: &str, corpus: String, config: &ReportConfig) -> Self {
        let mut capability_context = BTreeMap::new();
        capability_context.insert(config.capability_name.clone(), corpus);
        Self {
            query: instruction_for(company),
            capability_name: config.capability_name.clone(),
            timeout: config.timeout_secs,
            stream: false,
            capability_context,
        }
    }

    /// Size of the corpus carried by the request.
    pub fn context_chars(&self) -> usize {
        self.capability_context
            .values()
            .map(|c| c.chars().count())
            .sum()
    }
}

/// Instruction sent with every request.
pub fn instruction_for(company: &str) -> String {
    format!(
        "Generate a detailed report for the company whose details are provided. ({})",
        company
    )
}

/// Trait for report generation backends.
///
/// Implementors turn a [`ReportRequest`] into a [`Report`]. This abstraction
/// lets the pipeline run against the remote capability or a test double.
pub trait GenerateReport {
    async fn generate(&self, request: &ReportRequest) -> Result<Report, ReportError>;
}

/// Request body understood by the capability endpoint.
#[derive(Debug, Serialize)]
struct InvokeBody<'a> {
    assistant_id: &'a str,
    assistant_version: &'a str,
    #[serde(flatten)]
    request: &'a ReportRequest,
}

/// HTTP client for the hosted report capability.
#[derive(Debug, Clone)]
pub struct CapabilityClient {
    client: Client,
    endpoint: String,
    api_key: String,
    assistant_id: String,
    assistant_version: String,
    timeout_secs: u64,
}

impl CapabilityClient {
    pub fn new(
        config: &ReportConfig,
        api_key: impl Into<String>,
        assistant_id: impl Into<String>,
    ) -> Result<Self, ReportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: api_key.into(),
            assistant_id: assistant_id.into(),
            assistant_version: config.assistant_version.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

impl GenerateReport for CapabilityClient {
    #[instrument(level = "info", skip_all, fields(capability = %request.capability_name))]
    async fn generate(&self, request: &ReportRequest) -> Result<Report, ReportError> {
        let t0 = Instant::now();
        let body = InvokeBody {
            assistant_id: &self.assistant_id,
            assistant_version: &self.assistant_version,
            request,
        };

        let sent = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await;

        let response = match sent {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                error!(elapsed_ms = t0.elapsed().as_millis() as u64, "Report generation timed out");
                return Err(ReportError::Timeout(self.timeout_secs));
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) if e.is_timeout() => return Err(ReportError::Timeout(self.timeout_secs)),
            Err(e) => return Err(e.into()),
        };

        if !status.is_success() {
            error!(%status, body = %truncate_for_log(&text, 300), "Report capability returned an error");
            return Err(ReportError::Status {
                status,
                body: truncate_for_log(&text, 300),
            });
        }

        let report: Report = serde_json::from_str(&text)?;
        info!(
            elapsed_ms = t0.elapsed().as_millis() as u64,
            fields = report.parameters.len(),
            "Report generated"
        );
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Returns a fixed report and keeps every request it received.
    #[derive(Default)]
    pub(crate) struct FakeReportClient {
        pub(crate) report: Report,
        pub(crate) requests: parking_lot::Mutex<Vec<ReportRequest>>,
        pub(crate) fail: bool,
    }

    impl GenerateReport for FakeReportClient {
        async fn generate(&self, request: &ReportRequest) -> Result<Report, ReportError> {
            self.requests.lock().push(request.clone());
            if self.fail {
                return Err(ReportError::Timeout(600));
            }
            Ok(self.report.clone())
        }
    }

    fn config_for(server: &MockServer) -> ReportConfig {
        ReportConfig {
            endpoint: format!("{}/v1/capability/invoke", server.uri()),
            ..ReportConfig::default()
        }
    }

    #[test]
    fn test_request_for_company() {
        let request = ReportRequest::for_company("Acme Corp", "corpus".into(), &ReportConfig::default());
        assert_eq!(
            request.query,
            "Generate a detailed report for the company whose details are provided. (Acme Corp)"
        );
        assert_eq!(request.capability_name, "company_report_generation");
        assert_eq!(request.timeout, 600);
        assert!(!request.stream);
        assert_eq!(request.capability_context.len(), 1);
        assert_eq!(
            request.capability_context.get("company_report_generation"),
            Some(&"corpus".to_string())
        );
        assert_eq!(request.context_chars(), 6);
    }

    #[tokio::test]
    async fn test_generate_posts_request_and_parses_report() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/capability/invoke"))
            .and(header("authorization", "Bearer key"))
            .and(body_partial_json(json!({
                "assistant_id": "assistant",
                "assistant_version": "5.0.0",
                "capability_name": "company_report_generation",
                "timeout": 600,
                "stream": false,
                "capability_context": { "company_report_generation": "corpus" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parameters": {
                    "mission": "Build rockets",
                    "milestones": ["Founded 1999"]
                }
            })))
            .mount(&server)
            .await;

        let client = CapabilityClient::new(&config_for(&server), "key", "assistant").unwrap();
        let request = ReportRequest::for_company("Acme Corp", "corpus".into(), &ReportConfig::default());
        let report = client.generate(&request).await.unwrap();

        assert_eq!(report.text_or("mission", "Unavailable"), "Build rockets");
        assert_eq!(report.list_or_empty("milestones"), vec!["Founded 1999"]);
    }

    #[tokio::test]
    async fn test_generate_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = CapabilityClient::new(&config_for(&server), "key", "assistant").unwrap();
        let request = ReportRequest::for_company("Acme Corp", "corpus".into(), &ReportConfig::default());
        let err = client.generate(&request).await.unwrap_err();
        match err {
            ReportError::Status { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_generate_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "parameters": {} }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = ReportConfig {
            timeout_secs: 1,
            ..config_for(&server)
        };
        let client = CapabilityClient::new(&config, "key", "assistant").unwrap();
        let request = ReportRequest::for_company("Acme Corp", "corpus".into(), &config);
        let err = client.generate(&request).await.unwrap_err();
        assert!(matches!(err, ReportError::Timeout(1)));
    }

    #[tokio::test]
    async fn test_generate_rejects_malformed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        let client = CapabilityClient::new(&config_for(&server), "key", "assistant").unwrap();
        let request = ReportRequest::for_company("Acme Corp", "corpus".into(), &ReportConfig::default());
        let err = client.generate(&request).await.unwrap_err();
        assert!(matches!(err, ReportError::Payload(_)));
    }
}
