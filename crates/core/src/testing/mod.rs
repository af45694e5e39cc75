//! Testing utilities and mock implementations.
//!
//! Mocks for the remote service and the download fallback, so every stage of
//! the workflow can be exercised without a network or a browser.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use trimbee_core::testing::{MockNavigator, MockTrimService};
//! use trimbee_core::{Config, Workflow};
//!
//! let service = Arc::new(MockTrimService::new());
//! service.set_upload_file_id("abc").await;
//!
//! let workflow = Workflow::new(Config::default(), service.clone(), Arc::new(MockNavigator::new()));
//! ```

mod mock_navigator;
mod mock_trim_service;

pub use mock_navigator::MockNavigator;
pub use mock_trim_service::{MockTrimService, MOCK_BASE_URL};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::PathBuf;

    use crate::remote::{
        download_ref, ProcessAccept, ProcessResult, RemoteJobState, RemoteJobStatus,
        RemoteProcessingStats,
    };
    use crate::upload::{guess_media_type, LocalVideo};

    /// A video that does not exist on disk; the media type follows the name.
    pub fn local_video(name: &str, size_bytes: u64) -> LocalVideo {
        let path = PathBuf::from("/tmp/trimbee-fixtures").join(name);
        let media_type = guess_media_type(&path);
        LocalVideo::new(path, name, size_bytes, media_type)
    }

    /// A successful accept carrying processing statistics.
    pub fn accept_with_stats(
        elapsed: &str,
        original_size: &str,
        processed_size: &str,
        compression_ratio: f64,
    ) -> ProcessAccept {
        ProcessAccept {
            success: true,
            status: Some("completed".to_string()),
            message: Some("Video processing completed".to_string()),
            result: Some(ProcessResult {
                processing_stats: Some(RemoteProcessingStats {
                    processing_time_formatted: elapsed.to_string(),
                    original_size_formatted: original_size.to_string(),
                    processed_size_formatted: processed_size.to_string(),
                    compression_ratio,
                }),
            }),
            ..Default::default()
        }
    }

    /// A remote job status with an empty message.
    pub fn job_status(file_id: &str, status: RemoteJobState, progress: u8) -> RemoteJobStatus {
        RemoteJobStatus {
            file_id: file_id.to_string(),
            status,
            progress,
            message: String::new(),
            output_url: (status == RemoteJobState::Completed).then(|| download_ref(file_id)),
        }
    }
}
