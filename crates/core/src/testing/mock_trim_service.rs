//! Mock trimming service for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::remote::{
    ProcessAccept, ProcessRequest, RemoteError, RemoteJobState, RemoteJobStatus,
    TransferProgress, TrimService, UploadAck,
};
use crate::upload::LocalVideo;

/// Base URL the mock resolves artifact references against.
pub const MOCK_BASE_URL: &str = "http://mock.trim";

/// Mock implementation of the TrimService trait.
///
/// Provides controllable behavior for testing:
/// - Configure upload acknowledgements and process accepts
/// - Script the sequence of job statuses returned by polling
/// - Inject one-shot transport errors per endpoint
/// - Inspect what was uploaded, requested and fetched
///
/// # Example
///
/// ```rust,ignore
/// use trimbee_core::testing::{fixtures, MockTrimService};
///
/// let service = MockTrimService::new();
/// service.set_upload_file_id("abc").await;
/// service
///     .set_process_accept(fixtures::accept_with_stats("1m30s", "500MB", "120MB", 76.0))
///     .await;
///
/// // Drive the workflow...
///
/// assert_eq!(service.upload_count().await, 1);
/// ```
#[derive(Debug)]
pub struct MockTrimService {
    /// Acknowledgement returned by uploads.
    upload_ack: Arc<RwLock<UploadAck>>,
    /// Number of progress updates sent per upload.
    upload_chunks: Arc<RwLock<u64>>,
    /// Simulated delay between progress updates.
    chunk_delay_ms: Arc<RwLock<u64>>,
    next_upload_error: Arc<RwLock<Option<RemoteError>>>,
    /// Display names of uploaded videos.
    uploads: Arc<RwLock<Vec<String>>>,

    process_accept: Arc<RwLock<ProcessAccept>>,
    next_process_error: Arc<RwLock<Option<RemoteError>>>,
    process_requests: Arc<RwLock<Vec<ProcessRequest>>>,

    /// Scripted poll responses; once drained, `idle_job_status` is returned.
    job_statuses: Arc<RwLock<VecDeque<RemoteJobStatus>>>,
    /// Returned when the script is empty. `None` reports completion.
    idle_job_status: Arc<RwLock<Option<RemoteJobStatus>>>,
    /// Every poll fails with an HTTP 500 while set.
    fail_status_polls: Arc<RwLock<bool>>,
    status_polls: Arc<RwLock<usize>>,

    artifact: Arc<RwLock<Vec<u8>>>,
    next_fetch_error: Arc<RwLock<Option<RemoteError>>>,
    fetched_refs: Arc<RwLock<Vec<String>>>,
}

impl Default for MockTrimService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTrimService {
    /// Create a mock that accepts every upload and every job.
    pub fn new() -> Self {
        Self {
            upload_ack: Arc::new(RwLock::new(UploadAck {
                success: true,
                file_id: Some(uuid::Uuid::new_v4().to_string()),
                message: Some("File uploaded successfully".to_string()),
                ..Default::default()
            })),
            upload_chunks: Arc::new(RwLock::new(4)),
            chunk_delay_ms: Arc::new(RwLock::new(0)),
            next_upload_error: Arc::new(RwLock::new(None)),
            uploads: Arc::new(RwLock::new(Vec::new())),
            process_accept: Arc::new(RwLock::new(ProcessAccept {
                success: true,
                status: Some("completed".to_string()),
                message: Some("Video processing completed".to_string()),
                ..Default::default()
            })),
            next_process_error: Arc::new(RwLock::new(None)),
            process_requests: Arc::new(RwLock::new(Vec::new())),
            job_statuses: Arc::new(RwLock::new(VecDeque::new())),
            idle_job_status: Arc::new(RwLock::new(None)),
            fail_status_polls: Arc::new(RwLock::new(false)),
            status_polls: Arc::new(RwLock::new(0)),
            artifact: Arc::new(RwLock::new(b"mock-artifact".to_vec())),
            next_fetch_error: Arc::new(RwLock::new(None)),
            fetched_refs: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Acknowledge uploads with `file_id`.
    pub async fn set_upload_file_id(&self, file_id: &str) {
        let mut ack = self.upload_ack.write().await;
        ack.success = true;
        ack.file_id = Some(file_id.to_string());
    }

    /// Replace the upload acknowledgement wholesale.
    pub async fn set_upload_ack(&self, ack: UploadAck) {
        *self.upload_ack.write().await = ack;
    }

    /// Number of progress updates each upload reports.
    pub async fn set_upload_chunks(&self, chunks: u64) {
        *self.upload_chunks.write().await = chunks.max(1);
    }

    /// Delay between upload progress updates.
    pub async fn set_chunk_delay(&self, delay: Duration) {
        *self.chunk_delay_ms.write().await = delay.as_millis() as u64;
    }

    /// Fail the next upload with `error`.
    pub async fn set_next_upload_error(&self, error: RemoteError) {
        *self.next_upload_error.write().await = Some(error);
    }

    /// Display names of all uploads so far.
    pub async fn uploads(&self) -> Vec<String> {
        self.uploads.read().await.clone()
    }

    pub async fn upload_count(&self) -> usize {
        self.uploads.read().await.len()
    }

    /// Respond to process requests with `accept`.
    pub async fn set_process_accept(&self, accept: ProcessAccept) {
        *self.process_accept.write().await = accept;
    }

    /// Fail the next process request with `error`.
    pub async fn set_next_process_error(&self, error: RemoteError) {
        *self.next_process_error.write().await = Some(error);
    }

    /// All process requests received, in order.
    pub async fn process_requests(&self) -> Vec<ProcessRequest> {
        self.process_requests.read().await.clone()
    }

    /// Queue responses for subsequent status polls.
    pub async fn push_job_statuses(&self, statuses: Vec<RemoteJobStatus>) {
        self.job_statuses.write().await.extend(statuses);
    }

    /// Status returned once the scripted statuses run out.
    pub async fn set_idle_job_status(&self, status: RemoteJobStatus) {
        *self.idle_job_status.write().await = Some(status);
    }

    /// Make every status poll fail until turned off again.
    pub async fn fail_status_polls(&self, fail: bool) {
        *self.fail_status_polls.write().await = fail;
    }

    pub async fn status_poll_count(&self) -> usize {
        *self.status_polls.read().await
    }

    /// Payload returned by artifact fetches.
    pub async fn set_artifact(&self, payload: Vec<u8>) {
        *self.artifact.write().await = payload;
    }

    /// Fail the next artifact fetch with `error`.
    pub async fn set_next_fetch_error(&self, error: RemoteError) {
        *self.next_fetch_error.write().await = Some(error);
    }

    /// Output references requested so far, including failed fetches.
    pub async fn fetched_refs(&self) -> Vec<String> {
        self.fetched_refs.read().await.clone()
    }
}

#[async_trait]
impl TrimService for MockTrimService {
    fn name(&self) -> &str {
        "mock"
    }

    async fn upload(
        &self,
        video: &LocalVideo,
        progress_tx: mpsc::Sender<TransferProgress>,
    ) -> Result<UploadAck, RemoteError> {
        self.uploads.write().await.push(video.display_name.clone());

        if let Some(err) = self.next_upload_error.write().await.take() {
            return Err(err);
        }

        let chunks = *self.upload_chunks.read().await;
        let delay = Duration::from_millis(*self.chunk_delay_ms.read().await);
        let total = video.size_bytes;
        for i in 1..=chunks {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let progress = TransferProgress {
                sent_bytes: total * i / chunks,
                total_bytes: total,
            };
            // A closed receiver only stops reporting.
            let _ = progress_tx.send(progress).await;
        }

        let mut ack = self.upload_ack.read().await.clone();
        if ack.success {
            ack.original_filename = Some(video.display_name.clone());
        }
        Ok(ack)
    }

    async fn begin_processing(
        &self,
        request: &ProcessRequest,
    ) -> Result<ProcessAccept, RemoteError> {
        self.process_requests.write().await.push(request.clone());

        if let Some(err) = self.next_process_error.write().await.take() {
            return Err(err);
        }

        let mut accept = self.process_accept.read().await.clone();
        if accept.success && accept.file_id.is_none() {
            accept.file_id = Some(request.file_id.clone());
        }
        Ok(accept)
    }

    async fn job_status(&self, file_id: &str) -> Result<RemoteJobStatus, RemoteError> {
        *self.status_polls.write().await += 1;

        if *self.fail_status_polls.read().await {
            return Err(RemoteError::Http {
                status: 500,
                detail: Some("Internal server error".to_string()),
            });
        }

        if let Some(next) = self.job_statuses.write().await.pop_front() {
            return Ok(next);
        }
        if let Some(idle) = self.idle_job_status.read().await.clone() {
            return Ok(idle);
        }
        Ok(RemoteJobStatus {
            file_id: file_id.to_string(),
            status: RemoteJobState::Completed,
            progress: 100,
            message: "Video processing completed".to_string(),
            output_url: Some(crate::remote::download_ref(file_id)),
        })
    }

    async fn fetch_artifact(&self, output_ref: &str) -> Result<Vec<u8>, RemoteError> {
        self.fetched_refs.write().await.push(output_ref.to_string());

        if let Some(err) = self.next_fetch_error.write().await.take() {
            return Err(err);
        }
        Ok(self.artifact.read().await.clone())
    }

    fn artifact_url(&self, output_ref: &str) -> String {
        format!("{}{}", MOCK_BASE_URL, output_ref)
    }
}
