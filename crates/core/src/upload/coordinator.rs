//! Upload coordinator: validation and the single-payload transfer.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::UploadConfig;
use crate::error::{ValidationError, WorkflowError};
use crate::remote::{RemoteError, TransferProgress, TrimService};
use crate::status::{FileRecord, StatusStore};

use super::LocalVideo;

/// Progress updates buffered between the transport and the store.
const PROGRESS_BUFFER: usize = 64;

const GENERIC_TRANSFER_FAILURE: &str = "transfer failed";

/// Validates local files and transfers them to the remote service.
#[derive(Clone)]
pub struct UploadCoordinator {
    store: StatusStore,
    service: Arc<dyn TrimService>,
    max_size_bytes: u64,
}

impl UploadCoordinator {
    pub fn new(config: &UploadConfig, store: StatusStore, service: Arc<dyn TrimService>) -> Self {
        Self {
            store,
            service,
            max_size_bytes: config.max_size_bytes,
        }
    }

    /// Check size and media type. Touches neither the network nor the record.
    pub fn validate(&self, video: &LocalVideo) -> Result<(), ValidationError> {
        if video.size_bytes >= self.max_size_bytes {
            return Err(ValidationError::FileTooLarge {
                size_bytes: video.size_bytes,
                limit_bytes: self.max_size_bytes,
            });
        }
        if !video.is_video() {
            return Err(ValidationError::NotVideo {
                media_type: video.media_type.clone(),
            });
        }
        Ok(())
    }

    /// Validate and upload `video`, replacing the current workflow record.
    ///
    /// Transfer progress is applied to the record as it arrives. On success
    /// the record is `Idle` at 100% and holds the new file id; on failure it
    /// is `Failed`. Nothing is retried.
    pub async fn submit(&self, video: &LocalVideo) -> Result<FileRecord, WorkflowError> {
        self.validate(video)?;
        let _guard = self.store.try_claim("upload")?;
        self.store.begin_upload()?;

        info!(
            file = %video.display_name,
            bytes = video.size_bytes,
            service = self.service.name(),
            "Upload started"
        );

        let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_BUFFER);
        let mut upload = self.service.upload(video, progress_tx);

        let result = loop {
            tokio::select! {
                result = &mut upload => break result,
                Some(progress) = progress_rx.recv() => self.apply_progress(progress),
            }
        };
        while let Ok(progress) = progress_rx.try_recv() {
            self.apply_progress(progress);
        }

        match result {
            Ok(ack) if ack.success => match ack.file_id.filter(|id| !id.is_empty()) {
                Some(file_id) => {
                    let record = FileRecord {
                        id: file_id,
                        display_name: video.display_name.clone(),
                        size_bytes: video.size_bytes,
                        uploaded_at: Utc::now(),
                    };
                    self.store.upload_succeeded(record.clone())?;
                    info!(file_id = %record.id, file = %record.display_name, "Upload acknowledged");
                    Ok(record)
                }
                None => {
                    let error = RemoteError::InvalidResponse(
                        "upload acknowledged without a file id".to_string(),
                    );
                    Err(self.fail(error))
                }
            },
            Ok(ack) => {
                let detail = ack.detail.or(ack.message);
                Err(self.fail(RemoteError::Rejected { detail }))
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    fn apply_progress(&self, progress: TransferProgress) {
        match self.store.upload_progress(progress.percent()) {
            Ok(percent) => debug!(
                percent,
                sent = progress.sent_bytes,
                total = progress.total_bytes,
                "Upload progress"
            ),
            Err(e) => debug!("Dropped upload progress: {}", e),
        }
    }

    fn fail(&self, error: RemoteError) -> WorkflowError {
        let message = format!(
            "Upload failed: {}",
            error
                .detail()
                .unwrap_or_else(|| GENERIC_TRANSFER_FAILURE.to_string())
        );
        warn!(error = %error, "{}", message);
        if let Err(e) = self.store.upload_failed(message.clone()) {
            warn!("Could not record upload failure: {}", e);
        }
        WorkflowError::from_remote(error, message)
    }
}
