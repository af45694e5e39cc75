//! Error types for the download module.

use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;

/// Errors that can occur while retrieving a finished artifact.
///
/// None of these change the workflow record; a completed job stays
/// downloadable.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// There is no completed job to download.
    #[error("Download link unavailable: processing has not completed")]
    NotReady,

    /// Artifact retrieval failed.
    #[error("Download failed: {0}")]
    Fetch(#[source] RemoteError),

    /// Failed to write the artifact locally.
    #[error("Failed to save artifact to {path}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
