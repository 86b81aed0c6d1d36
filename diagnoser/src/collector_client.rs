use std::time::Duration;

use serde::Deserialize;
use trace2pass_common::AnomalyReport;

use crate::error::DiagnoserError;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    report: AnomalyReport,
}

/// Fetches one queued report by fingerprint from a running Collector.
pub fn fetch_report(collector_url: &str, fingerprint: &str) -> Result<AnomalyReport, DiagnoserError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(|err| DiagnoserError::SubprocessFailed(format!("building http client: {err}")))?;

    let url = format!("{}/api/v1/reports/{}", collector_url.trim_end_matches('/'), fingerprint);
    let response = client
        .get(&url)
        .send()
        .map_err(|err| DiagnoserError::SubprocessFailed(format!("GET {url}: {err}")))?;

    if !response.status().is_success() {
        return Err(DiagnoserError::SubprocessFailed(format!("GET {url}: status {}", response.status())));
    }

    let envelope: RecordEnvelope = response
        .json()
        .map_err(|err| DiagnoserError::SubprocessFailed(format!("decoding response from {url}: {err}")))?;
    Ok(envelope.report)
}
