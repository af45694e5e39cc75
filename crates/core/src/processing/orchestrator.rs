//! Processing orchestrator: issues the begin-processing request and hands an
//! accepted job to the progress cycle.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ProcessingConfig;
use crate::error::{ValidationError, WorkflowError};
use crate::remote::{ProcessRequest, RemoteError, TrimService};
use crate::status::{BusyGuard, ProcessingStats, ProcessingStatus, StatusStore};

use super::cycle::{CancelSignal, ProgressCycle};

const GENERIC_PROCESSING_FAILURE: &str = "the service did not accept the job";

/// A running progress cycle.
///
/// Dropping the handle does not stop the cycle.
pub struct ProcessingHandle {
    task: JoinHandle<()>,
    cancel_tx: broadcast::Sender<()>,
    store: StatusStore,
}

impl ProcessingHandle {
    /// Ask the cycle to stop. The record moves to `Failed`.
    pub fn cancel(&self) {
        // No receiver left means the cycle already finished.
        let _ = self.cancel_tx.send(());
    }

    /// A detached way to cancel, e.g. from a signal handler.
    pub fn canceller(&self) -> Canceller {
        Canceller {
            cancel_tx: self.cancel_tx.clone(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the cycle to reach a rest state and return the final record.
    pub async fn wait(self) -> ProcessingStatus {
        if let Err(e) = self.task.await {
            error!("Progress cycle task failed: {}", e);
        }
        self.store.snapshot()
    }
}

/// Cancels the cycle of the handle it came from.
#[derive(Clone)]
pub struct Canceller {
    cancel_tx: broadcast::Sender<()>,
}

impl Canceller {
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(());
    }
}

/// Starts remote processing jobs and drives their progress cycle.
#[derive(Clone)]
pub struct ProcessingOrchestrator {
    store: StatusStore,
    service: Arc<dyn TrimService>,
    config: ProcessingConfig,
}

impl ProcessingOrchestrator {
    pub fn new(
        config: ProcessingConfig,
        store: StatusStore,
        service: Arc<dyn TrimService>,
    ) -> Self {
        Self {
            store,
            service,
            config,
        }
    }

    /// Request processing of the last uploaded file.
    ///
    /// On accept the record moves to `Processing` at 0% and the progress cycle
    /// is spawned; the returned handle follows it. On rejection or transport
    /// failure the record moves straight to `Failed` and no cycle runs.
    pub async fn start(
        &self,
        file_id: &str,
        target_duration_seconds: u32,
    ) -> Result<ProcessingHandle, WorkflowError> {
        if file_id.is_empty() {
            return Err(ValidationError::MissingFileId.into());
        }
        match self.store.file_record() {
            Some(record) if record.id == file_id => {}
            _ => {
                return Err(ValidationError::UnknownFile {
                    file_id: file_id.to_string(),
                }
                .into())
            }
        }
        if target_duration_seconds == 0 {
            return Err(ValidationError::InvalidDuration.into());
        }

        let guard = self.store.try_claim("start processing")?;
        self.store.ensure_can_start()?;

        let request = ProcessRequest {
            file_id: file_id.to_string(),
            target_duration_seconds,
        };
        info!(
            file_id,
            target_secs = target_duration_seconds,
            mode = ?self.config.mode,
            "Requesting processing"
        );

        match self.service.begin_processing(&request).await {
            Ok(accept) if accept.success => {
                self.store.processing_accepted()?;
                info!(file_id, "Processing accepted");
                Ok(self.spawn_cycle(request.file_id, accept.stats(), guard))
            }
            Ok(accept) => {
                let detail = accept.detail.or(accept.message);
                Err(self.reject(RemoteError::Rejected { detail }))
            }
            Err(e) => Err(self.reject(e)),
        }
    }

    fn spawn_cycle(
        &self,
        file_id: String,
        stats: Option<ProcessingStats>,
        guard: BusyGuard,
    ) -> ProcessingHandle {
        let (cancel_tx, cancel_rx) = broadcast::channel(1);
        let cycle = ProgressCycle {
            store: self.store.clone(),
            service: Arc::clone(&self.service),
            config: self.config.clone(),
            file_id,
            stats,
        };

        let task = tokio::spawn(async move {
            // Released once the record reaches a rest state.
            let _guard = guard;
            cycle.run(CancelSignal::new(cancel_rx)).await;
        });

        ProcessingHandle {
            task,
            cancel_tx,
            store: self.store.clone(),
        }
    }

    fn reject(&self, error: RemoteError) -> WorkflowError {
        let message = format!(
            "Processing failed: {}",
            error
                .detail()
                .unwrap_or_else(|| GENERIC_PROCESSING_FAILURE.to_string())
        );
        warn!(error = %error, "{}", message);
        if let Err(e) = self.store.processing_rejected(message.clone()) {
            warn!("Could not record processing rejection: {}", e);
        }
        WorkflowError::from_remote(error, message)
    }
}
