//! HTTP client for the VirusTotal v3 API.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, instrument};
use vigil_core::{EngineVerdict, VerdictSnapshot, VerdictStats};
use vigil_error::{ScanError, ScanErrorKind, ScanResult};
use vigil_interface::{AnalysisStatus, VerdictService};
use vigil_rate_limit::ApiThrottle;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct UploadResponse {
    data: UploadData,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
    data: AnalysisData,
}

#[derive(Debug, Deserialize)]
struct AnalysisData {
    attributes: AnalysisAttributes,
}

#[derive(Debug, Deserialize)]
struct AnalysisAttributes {
    #[serde(default)]
    status: String,
    #[serde(default)]
    stats: VerdictStats,
    #[serde(default)]
    results: BTreeMap<String, EngineVerdict>,
    #[serde(default)]
    date: Option<i64>,
}

impl From<AnalysisAttributes> for AnalysisStatus {
    fn from(attributes: AnalysisAttributes) -> Self {
        AnalysisStatus {
            status: attributes.status,
            snapshot: VerdictSnapshot {
                stats: attributes.stats,
                engines: attributes.results,
                date: attributes.date,
            },
        }
    }
}

/// VirusTotal v3 client.
///
/// The API key is passed per call and only ever placed in the `X-Apikey`
/// header; it is never logged.
#[derive(Debug, Clone)]
pub struct VirusTotalClient {
    client: Client,
    base_url: String,
    throttle: Option<ApiThrottle>,
}

impl VirusTotalClient {
    /// Client for `base_url`, e.g. `https://www.virustotal.com/api/v3`.
    ///
    /// A `requests_per_minute` of zero leaves calls unthrottled.
    #[instrument(fields(base_url = %base_url.as_ref()), skip(base_url))]
    pub fn new(base_url: impl AsRef<str>, requests_per_minute: u32) -> ScanResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ScanError::new(ScanErrorKind::NetworkError(e.to_string())))?;
        let throttle = ApiThrottle::per_minute(requests_per_minute);
        debug!(throttled = throttle.is_some(), "Created verdict client");
        Ok(Self {
            client,
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            throttle,
        })
    }

    /// Base URL requests go to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn pace(&self) {
        if let Some(throttle) = &self.throttle {
            throttle.acquire().await;
        }
    }
}

fn rejected(status: StatusCode) -> Option<ScanError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Some(ScanError::new(ScanErrorKind::InvalidApiKey))
        }
        _ => None,
    }
}

fn transport(e: reqwest::Error) -> ScanError {
    error!(error = %e, "Verdict service request failed");
    ScanError::new(ScanErrorKind::NetworkError(e.without_url().to_string()))
}

#[async_trait]
impl VerdictService for VirusTotalClient {
    #[instrument(skip(self, api_key, bytes), fields(size = bytes.len()))]
    async fn submit(&self, api_key: &str, filename: &str, bytes: Vec<u8>) -> ScanResult<String> {
        self.pace().await;
        let form = Form::new().part("file", Part::bytes(bytes).file_name(filename.to_string()));
        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .header("X-Apikey", api_key)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if let Some(err) = rejected(status) {
            error!(status = %status, "Verdict service rejected the API key");
            return Err(err);
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Upload refused");
            return Err(ScanError::new(ScanErrorKind::UploadFailed(format!(
                "verdict service answered {}",
                status
            ))));
        }

        let upload: UploadResponse = response.json().await.map_err(|e| {
            ScanError::new(ScanErrorKind::UploadFailed(format!(
                "unreadable upload response: {}",
                e.without_url()
            )))
        })?;
        debug!(analysis_id = %upload.data.id, "File submitted");
        Ok(upload.data.id)
    }

    #[instrument(skip(self, api_key))]
    async fn poll(&self, api_key: &str, analysis_id: &str) -> ScanResult<AnalysisStatus> {
        self.pace().await;
        let response = self
            .client
            .get(format!("{}/analyses/{}", self.base_url, analysis_id))
            .header("X-Apikey", api_key)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if let Some(err) = rejected(status) {
            return Err(err);
        }
        if status != StatusCode::OK {
            return Err(ScanError::new(ScanErrorKind::NetworkError(format!(
                "analysis lookup answered {}",
                status
            ))));
        }

        let analysis: AnalysisResponse = response.json().await.map_err(|e| {
            ScanError::new(ScanErrorKind::NetworkError(format!(
                "unreadable analysis response: {}",
                e.without_url()
            )))
        })?;
        let status = AnalysisStatus::from(analysis.data.attributes);
        debug!(status = %status.status, engines = status.snapshot.engines.len(), "Polled analysis");
        Ok(status)
    }
}
