//! Error types shared by the workflow stages.

use thiserror::Error;

use crate::download::DownloadError;
use crate::remote::RemoteError;
use crate::status::StatusError;

/// Local precondition failures. Raised before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// File is at or above the upload ceiling.
    #[error(
        "File size must stay below {} (file is {})",
        human_size(.limit_bytes),
        human_size(.size_bytes)
    )]
    FileTooLarge { size_bytes: u64, limit_bytes: u64 },

    /// Declared media type is not a video.
    #[error("Please upload a video file (got {media_type})")]
    NotVideo { media_type: String },

    #[error("No uploaded file to process")]
    MissingFileId,

    /// The file id does not belong to the last acknowledged upload.
    #[error("File {file_id} is not the current upload")]
    UnknownFile { file_id: String },

    #[error("Target duration must be positive")]
    InvalidDuration,

    #[error("Target duration must be between {min} and {max} minutes, got {minutes}")]
    DurationOutOfRange { minutes: u32, min: u32, max: u32 },
}

/// Binary-unit size for messages, e.g. `2.00 GiB`.
pub(crate) fn human_size(bytes: &u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if *bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = *bytes as f64;
    let mut unit = "B";
    for next in UNITS {
        if value < 1024.0 {
            break;
        }
        value /= 1024.0;
        unit = next;
    }
    format!("{:.2} {}", value, unit)
}

/// Errors returned by workflow operations.
///
/// Upload and processing failures have already been written into the status
/// record as a `Failed` state by the time the caller sees them.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Network-level failure on an upload, process or status call.
    #[error("Transport error: {0}")]
    Transport(#[source] RemoteError),

    /// The service was reachable but refused the request.
    #[error("Server rejected request: {message}")]
    ServerRejection { message: String },

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

impl WorkflowError {
    /// Classify a remote failure. `message` is what was written to the record.
    pub(crate) fn from_remote(error: RemoteError, message: String) -> Self {
        if error.is_transport() {
            WorkflowError::Transport(error)
        } else {
            WorkflowError::ServerRejection { message }
        }
    }
}
