// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Reeld service integration module for reelctl.
//!
//! Provides a typed interface to the download service's HTTP/JSON API:
//! analyzing a video URL, starting a download job, polling job progress,
//! and listing completed files.
//!
//! # Example
//!
//! ```no_run
//! use reelctl::client::{JobService, ReeldClient};
//!
//! # async fn example() -> Result<(), reelctl::client::ReeldError> {
//! let client = ReeldClient::new();
//!
//! let info = client.analyze("https://example.com/watch?v=demo").await?;
//! println!("{} ({} formats)", info.title, info.formats.len());
//!
//! let id = client.start_download("https://example.com/watch?v=demo", "best").await?;
//! let snapshot = client.poll_status(&id).await?;
//! println!("{:?}", snapshot.status);
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{FormatOption, RemoteFile, RemoteStatus, StatusSnapshot, VideoInfo};

/// Default reeld endpoint.
const DEFAULT_REELD_URL: &str = "http://127.0.0.1:5000";

/// Timeout for establishing connections (in seconds).
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Timeout for analyze and start requests (in seconds). Extraction can be
/// slow for sites the service has to scrape.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Timeout for a single status poll (in seconds). Polls must come back well
/// within the polling cadence or be treated as failed.
const POLL_TIMEOUT_SECS: u64 = 10;

/// Error types for reeld operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ReeldError {
    /// The request was rejected locally before anything was sent.
    InvalidInput(String),
    /// The service answered with an error payload; message is verbatim.
    Remote(String),
    /// Network or HTTP-level failure talking to the service.
    Transport(String),
}

impl std::fmt::Display for ReeldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Self::Remote(msg) => write!(f, "Service error: {}", msg),
            Self::Transport(msg) => write!(f, "Network error: {}", msg),
        }
    }
}

impl std::error::Error for ReeldError {}

impl ReeldError {
    /// True for network-level failures, which are retryable during polling.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// The remote operations the session layer depends on.
///
/// `ReeldClient` is the production implementation; tests script their own.
pub trait JobService: Send + Sync + 'static {
    /// Fetch metadata and available formats for a video URL.
    fn analyze(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<VideoInfo, ReeldError>> + Send;

    /// Start an asynchronous download job; returns the service-assigned id.
    fn start_download(
        &self,
        url: &str,
        format_selector: &str,
    ) -> impl Future<Output = Result<String, ReeldError>> + Send;

    /// Fetch the latest known status for a job id.
    ///
    /// Never fails merely because the job is still running.
    fn poll_status(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<StatusSnapshot, ReeldError>> + Send;
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct StartRequest<'a> {
    url: &'a str,
    format_id: &'a str,
}

/// Internal response structure for the analyze endpoint.
#[derive(Debug, Deserialize)]
struct InfoResponse {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<WireFormat>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireFormat {
    format_id: String,
    resolution: String,
    ext: String,
    filesize: Option<u64>,
}

/// Internal response structure for the start endpoint.
#[derive(Debug, Deserialize)]
struct StartResponse {
    download_id: Option<String>,
    error: Option<String>,
}

/// Internal response structure for the progress endpoint.
#[derive(Debug, Deserialize)]
struct ProgressResponse {
    status: Option<String>,
    percent: Option<f64>,
    speed: Option<String>,
    filename: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    name: String,
    size: u64,
    modified: String,
}

fn video_info_from(body: InfoResponse) -> VideoInfo {
    VideoInfo {
        title: body.title.unwrap_or_else(|| "Unknown".to_string()),
        duration_seconds: body.duration.map(|d| d.max(0.0).round() as u64),
        // The extractor reports missing thumbnails as an empty string.
        thumbnail_url: body.thumbnail.filter(|t| !t.is_empty()),
        formats: body
            .formats
            .into_iter()
            .map(|f| FormatOption {
                format_id: f.format_id,
                resolution_label: f.resolution,
                container_ext: f.ext,
                filesize: f.filesize,
            })
            .collect(),
    }
}

fn snapshot_from(body: ProgressResponse) -> StatusSnapshot {
    StatusSnapshot {
        status: body
            .status
            .as_deref()
            .map(RemoteStatus::parse)
            .unwrap_or_default(),
        percent: body.percent.map(|p| p.clamp(0.0, 100.0)),
        speed: body.speed,
        filename: body.filename,
        error: body.error,
    }
}

/// Client for the reeld download service.
#[derive(Debug, Clone)]
pub struct ReeldClient {
    /// Base URL for the service API.
    base_url: String,
    /// HTTP client with configured timeouts.
    client: reqwest::Client,
}

impl Default for ReeldClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ReeldClient {
    /// Create a new client with default settings.
    ///
    /// Connects to `http://127.0.0.1:5000` by default.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_REELD_URL)
    }

    /// Create a new client with a custom base URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The base URL for the service (e.g., "http://media-box:5000")
    pub fn with_url(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// The base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transport_error(&self, e: reqwest::Error, what: &str) -> ReeldError {
        if e.is_connect() {
            ReeldError::Transport(format!(
                "Cannot connect to the download service at {}. Is it running?",
                self.base_url
            ))
        } else if e.is_timeout() {
            ReeldError::Transport(format!("{} timed out", what))
        } else {
            ReeldError::Transport(e.to_string())
        }
    }

    /// List completed files in the service's download folder.
    pub async fn list_downloads(&self) -> Result<Vec<RemoteFile>, ReeldError> {
        let endpoint = format!("{}/downloads", self.base_url);

        let response = self
            .client
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| self.transport_error(e, "Listing downloads"))?;

        if !response.status().is_success() {
            return Err(ReeldError::Remote(format!(
                "Failed to list downloads: HTTP {}",
                response.status()
            )));
        }

        let files: Vec<FileEntry> = response
            .json()
            .await
            .map_err(|e| ReeldError::Transport(format!("Malformed listing response: {}", e)))?;

        Ok(files
            .into_iter()
            .map(|f| RemoteFile {
                name: f.name,
                size: f.size,
                modified: f.modified,
            })
            .collect())
    }
}

impl JobService for ReeldClient {
    async fn analyze(&self, url: &str) -> Result<VideoInfo, ReeldError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ReeldError::InvalidInput("URL is required".to_string()));
        }

        let endpoint = format!("{}/get_info", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .json(&AnalyzeRequest { url })
            .send()
            .await
            .map_err(|e| self.transport_error(e, "Analyze request"))?;

        // The service reports failures as an error payload, usually with a
        // non-2xx status; the payload message takes precedence.
        let status = response.status();
        let body: InfoResponse = response
            .json()
            .await
            .map_err(|e| ReeldError::Transport(format!("Malformed analyze response: {}", e)))?;

        if let Some(message) = body.error {
            return Err(ReeldError::Remote(message));
        }
        if !status.is_success() {
            return Err(ReeldError::Remote(format!("Analyze failed: HTTP {}", status)));
        }

        Ok(video_info_from(body))
    }

    async fn start_download(
        &self,
        url: &str,
        format_selector: &str,
    ) -> Result<String, ReeldError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(ReeldError::InvalidInput("URL is required".to_string()));
        }

        let endpoint = format!("{}/download", self.base_url);

        let response = self
            .client
            .post(&endpoint)
            .json(&StartRequest {
                url,
                format_id: format_selector,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e, "Start request"))?;

        let status = response.status();
        let body: StartResponse = response
            .json()
            .await
            .map_err(|e| ReeldError::Transport(format!("Malformed start response: {}", e)))?;

        if let Some(message) = body.error {
            return Err(ReeldError::Remote(message));
        }

        match body.download_id {
            Some(id) => Ok(id),
            None => Err(ReeldError::Remote(format!(
                "Start response carried no download id (HTTP {})",
                status
            ))),
        }
    }

    async fn poll_status(&self, id: &str) -> Result<StatusSnapshot, ReeldError> {
        let endpoint = format!("{}/progress/{}", self.base_url, id);

        let response = self
            .client
            .get(&endpoint)
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| self.transport_error(e, "Status poll"))?;

        let body: ProgressResponse = response
            .json()
            .await
            .map_err(|e| ReeldError::Transport(format!("Malformed progress response: {}", e)))?;

        Ok(snapshot_from(body))
    }
}
