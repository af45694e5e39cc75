//! HTTP implementation of the trimming service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{multipart, Body, Client, Response};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tokio::sync::{mpsc, Notify};
use tokio::time::timeout;
use tracing::debug;

use crate::config::ServiceConfig;
use crate::upload::LocalVideo;

use super::{
    ProcessAccept, ProcessRequest, RemoteError, RemoteJobStatus, TransferProgress, TrimService,
    UploadAck,
};

const UPLOAD_CHUNK_SIZE: usize = 256 * 1024;

/// Trimming service reached over HTTP.
///
/// Transfers of unbounded size (the upload body and the artifact) are bounded
/// by inactivity, not by total duration. Process and status calls carry a
/// whole-request deadline.
pub struct HttpTrimService {
    client: Client,
    base_url: String,
    idle_timeout: Duration,
    process_timeout: Duration,
    status_timeout: Duration,
}

impl HttpTrimService {
    /// Create a new client. Every request is bounded by the configured timeouts.
    pub fn new(config: &ServiceConfig) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(RemoteError::from_reqwest)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            process_timeout: Duration::from_secs(config.process_timeout_secs),
            status_timeout: Duration::from_secs(config.status_timeout_secs),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Turn a non-success response into `RemoteError::Http`, keeping the server detail.
async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(RemoteError::Http {
        status: status.as_u16(),
        detail: extract_detail(&body),
    })
}

/// Pull `detail` out of an error body, falling back to the start of the raw body.
fn extract_detail(body: &str) -> Option<String> {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        return match json.get("detail") {
            Some(Value::String(detail)) => Some(detail.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(200).collect())
    }
}

/// Read `file` in chunks, reporting cumulative bytes as each chunk is yielded.
///
/// `activity` is notified once per chunk handed to the transport.
fn progress_stream(
    file: tokio::fs::File,
    total_bytes: u64,
    progress_tx: mpsc::Sender<TransferProgress>,
    activity: Arc<Notify>,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    futures::stream::try_unfold(
        (file, progress_tx, 0u64),
        move |(mut file, progress_tx, sent)| {
            let activity = Arc::clone(&activity);
            async move {
                let mut buf = vec![0u8; UPLOAD_CHUNK_SIZE];
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    return Ok(None);
                }
                buf.truncate(n);
                let sent_bytes = sent + n as u64;
                activity.notify_one();
                // Receiver gone means nobody is watching; keep transferring.
                let _ = progress_tx
                    .send(TransferProgress {
                        sent_bytes,
                        total_bytes,
                    })
                    .await;
                Ok(Some((buf, (file, progress_tx, sent_bytes))))
            }
        },
    )
}

#[async_trait]
impl TrimService for HttpTrimService {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(
        &self,
        video: &LocalVideo,
        progress_tx: mpsc::Sender<TransferProgress>,
    ) -> Result<UploadAck, RemoteError> {
        let file = tokio::fs::File::open(&video.path).await?;
        let total_bytes = file.metadata().await?.len();

        let activity = Arc::new(Notify::new());
        let body = Body::wrap_stream(progress_stream(
            file,
            total_bytes,
            progress_tx,
            Arc::clone(&activity),
        ));
        let part = multipart::Part::stream_with_length(body, total_bytes)
            .file_name(video.display_name.clone())
            .mime_str(&video.media_type)
            .map_err(|e| {
                RemoteError::Transport(format!("Invalid media type {}: {}", video.media_type, e))
            })?;
        let form = multipart::Form::new().part("file", part);

        let url = self.url("/api/upload");
        debug!(url = %url, bytes = total_bytes, file = %video.display_name, "Uploading video");

        let send = self.client.post(&url).multipart(form).send();
        tokio::pin!(send);
        // The deadline restarts whenever another chunk goes out.
        let response = loop {
            tokio::select! {
                response = &mut send => break response.map_err(RemoteError::from_reqwest)?,
                _ = activity.notified() => {}
                _ = tokio::time::sleep(self.idle_timeout) => return Err(RemoteError::Timeout),
            }
        };

        let response = check_status(response).await?;
        timeout(self.idle_timeout, response.json::<UploadAck>())
            .await
            .map_err(|_| RemoteError::Timeout)?
            .map_err(|e| RemoteError::InvalidResponse(format!("Failed to parse upload ack: {}", e)))
    }

    async fn begin_processing(
        &self,
        request: &ProcessRequest,
    ) -> Result<ProcessAccept, RemoteError> {
        let url = self.url("/api/process");
        debug!(
            url = %url,
            file_id = %request.file_id,
            target_secs = request.target_duration_seconds,
            "Requesting processing"
        );

        let response = self
            .client
            .post(&url)
            .timeout(self.process_timeout)
            .json(request)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        check_status(response)
            .await?
            .json::<ProcessAccept>()
            .await
            .map_err(|e| {
                RemoteError::InvalidResponse(format!("Failed to parse process response: {}", e))
            })
    }

    async fn job_status(&self, file_id: &str) -> Result<RemoteJobStatus, RemoteError> {
        let url = self.url(&format!("/api/status/{}", urlencoding::encode(file_id)));
        debug!(url = %url, "Polling job status");

        let response = self
            .client
            .get(&url)
            .timeout(self.status_timeout)
            .send()
            .await
            .map_err(RemoteError::from_reqwest)?;

        check_status(response)
            .await?
            .json::<RemoteJobStatus>()
            .await
            .map_err(|e| RemoteError::InvalidResponse(format!("Failed to parse job status: {}", e)))
    }

    async fn fetch_artifact(&self, output_ref: &str) -> Result<Vec<u8>, RemoteError> {
        let url = self.artifact_url(output_ref);
        debug!(url = %url, "Fetching artifact");

        let response = timeout(self.idle_timeout, self.client.get(&url).send())
            .await
            .map_err(|_| RemoteError::Timeout)?
            .map_err(RemoteError::from_reqwest)?;
        let response = check_status(response).await?;

        let mut payload = Vec::with_capacity(response.content_length().unwrap_or(0) as usize);
        let mut chunks = response.bytes_stream();
        // Each chunk gets its own deadline, so a slow but moving transfer completes.
        while let Some(chunk) = timeout(self.idle_timeout, chunks.next())
            .await
            .map_err(|_| RemoteError::Timeout)?
        {
            payload.extend_from_slice(&chunk.map_err(RemoteError::from_reqwest)?);
        }
        Ok(payload)
    }

    fn artifact_url(&self, output_ref: &str) -> String {
        if output_ref.starts_with("http://") || output_ref.starts_with("https://") {
            output_ref.to_string()
        } else {
            self.url(output_ref)
        }
    }
}
