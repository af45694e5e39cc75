//! Types for talking to the remote trimming service.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::status::ProcessingStats;
use crate::upload::LocalVideo;

/// Errors that can occur while calling the remote service.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status, with the server's `detail` if it sent one.
    #[error("HTTP {status}: {}", .detail.as_deref().unwrap_or("no detail"))]
    Http { status: u16, detail: Option<String> },

    /// The endpoint answered but reported `success: false`.
    #[error("Request rejected: {}", .detail.as_deref().unwrap_or("no detail"))]
    Rejected { detail: Option<String> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// Human-readable detail for status messages.
    ///
    /// Prefers the server's own detail; otherwise describes the failure itself.
    /// `None` only when the server rejected without saying why.
    pub fn detail(&self) -> Option<String> {
        match self {
            RemoteError::Http { status, detail } => detail
                .clone()
                .or_else(|| Some(format!("HTTP {}", status))),
            RemoteError::Rejected { detail } => detail.clone(),
            other => Some(other.to_string()),
        }
    }

    /// Whether the failure happened below the HTTP layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            RemoteError::ConnectionFailed(_)
                | RemoteError::Timeout
                | RemoteError::Transport(_)
                | RemoteError::Io(_)
        )
    }

    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else if e.is_connect() {
            RemoteError::ConnectionFailed(e.to_string())
        } else if e.is_decode() {
            RemoteError::InvalidResponse(e.to_string())
        } else {
            RemoteError::Transport(e.to_string())
        }
    }
}

/// Bytes handed to the transport so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub sent_bytes: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    /// Rounded percentage in `0..=100`. An empty payload counts as done.
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        let sent = self.sent_bytes.min(self.total_bytes) as f64;
        (sent * 100.0 / self.total_bytes as f64).round() as u8
    }
}

/// Upload endpoint acknowledgement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UploadAck {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    /// Name the server stored the file under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Body of the "begin processing" request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessRequest {
    pub file_id: String,
    #[serde(rename = "target_duration")]
    pub target_duration_seconds: u32,
}

/// Statistics as the service reports them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteProcessingStats {
    pub processing_time_formatted: String,
    pub original_size_formatted: String,
    pub processed_size_formatted: String,
    #[serde(default)]
    pub compression_ratio: f64,
}

impl From<RemoteProcessingStats> for ProcessingStats {
    fn from(stats: RemoteProcessingStats) -> Self {
        ProcessingStats::new(
            stats.processing_time_formatted,
            stats.original_size_formatted,
            stats.processed_size_formatted,
            stats.compression_ratio,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_stats: Option<RemoteProcessingStats>,
}

/// Process endpoint accept response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessAccept {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ProcessResult>,
}

impl ProcessAccept {
    /// Statistics captured at accept time, if the server sent any.
    pub fn stats(&self) -> Option<ProcessingStats> {
        self.result
            .as_ref()
            .and_then(|r| r.processing_stats.clone())
            .map(ProcessingStats::from)
    }
}

/// Remote view of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteJobState {
    /// Input present, no output yet.
    Ready,
    Processing,
    Completed,
    NotFound,
    #[serde(other)]
    Unknown,
}

impl RemoteJobState {
    /// Name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RemoteJobState::Ready => "ready",
            RemoteJobState::Processing => "processing",
            RemoteJobState::Completed => "completed",
            RemoteJobState::NotFound => "not_found",
            RemoteJobState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for RemoteJobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RemoteJobStatus {
    /// One-line summary, e.g. `abc: processing 45% AI is analyzing...`.
    pub fn summary(&self) -> String {
        let line = format!("{}: {} {}%", self.file_id, self.status, self.progress);
        if self.message.is_empty() {
            line
        } else {
            format!("{} {}", line, self.message)
        }
    }
}

/// Status endpoint response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteJobStatus {
    pub file_id: String,
    pub status: RemoteJobState,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
}

/// The remote trimming service.
///
/// Implemented over HTTP by [`HttpTrimService`](super::HttpTrimService) and by
/// `testing::MockTrimService` for tests.
#[async_trait]
pub trait TrimService: Send + Sync {
    /// Returns the name of this implementation.
    fn name(&self) -> &str;

    /// Transfer `video` as one multipart payload.
    ///
    /// Progress is sent on `progress_tx` as bytes are handed to the transport.
    /// If the receiver is dropped the transfer continues without reporting.
    async fn upload(
        &self,
        video: &LocalVideo,
        progress_tx: mpsc::Sender<TransferProgress>,
    ) -> Result<UploadAck, RemoteError>;

    /// Ask the service to start trimming an uploaded file.
    async fn begin_processing(&self, request: &ProcessRequest)
        -> Result<ProcessAccept, RemoteError>;

    /// Current remote status of a job.
    async fn job_status(&self, file_id: &str) -> Result<RemoteJobStatus, RemoteError>;

    /// Retrieve a finished artifact.
    async fn fetch_artifact(&self, output_ref: &str) -> Result<Vec<u8>, RemoteError>;

    /// Absolute URL for an output reference, for direct navigation.
    fn artifact_url(&self, output_ref: &str) -> String;
}
