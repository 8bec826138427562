use std::time::Duration;

use crate::reporting::domain::report_sink::{CountsSnapshot, ReportError, ReportSink};
use crate::shared::constants::COUNTS_ENDPOINT;

/// Posts count snapshots as JSON to the dashboard API.
///
/// Each request is bounded by `timeout`; a slow or absent dashboard
/// surfaces as an error, never as a hang.
pub struct HttpReportSink {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpReportSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ReportError> {
        let url = endpoint_url(base_url, COUNTS_ENDPOINT);
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| ReportError::Http {
                url: url.clone(),
                source,
            })?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ReportSink for HttpReportSink {
    fn report(&mut self, snapshot: &CountsSnapshot) -> Result<(), ReportError> {
        self.client
            .post(&self.url)
            .json(&snapshot.to_payload())
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|source| ReportError::Http {
                url: self.url.clone(),
                source,
            })?;
        Ok(())
    }
}

/// Joins a base URL and an absolute endpoint path without doubling slashes.
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), endpoint)
}
