//! The progress cycle that runs after a job is accepted.
//!
//! Two drivers share one finalization step:
//! - simulated: a fixed-cadence timer adds a fixed step until 100%
//! - poll: the status endpoint is polled with exponential backoff, bounded
//!   by a consecutive-failure limit and an overall deadline

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval_at, sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{ProcessingConfig, ProgressMode};
use crate::remote::{download_ref, RemoteJobState, TrimService};
use crate::status::{ProcessingStats, StatusStore};

const COMPLETED_MESSAGE: &str = "Processing complete!";
const CANCELLED_MESSAGE: &str = "Processing cancelled";

/// Highest progress a poll may report before the job says it is completed.
const POLL_PROGRESS_CEILING: u8 = 99;

/// Completion message, with a compression clause only for a positive ratio.
pub fn completion_message(stats: Option<&ProcessingStats>) -> String {
    let Some(stats) = stats else {
        return COMPLETED_MESSAGE.to_string();
    };

    let mut message = format!(
        "{} Took {}, file size went from {} to {}",
        COMPLETED_MESSAGE,
        stats.elapsed_formatted,
        stats.original_size_formatted,
        stats.processed_size_formatted
    );
    if stats.compression_ratio_percent > 0.0 {
        message.push_str(&format!(
            ", compressed by {:.1}%",
            stats.compression_ratio_percent
        ));
    }
    message
}

/// How a cycle ended.
#[derive(Debug, PartialEq)]
pub(crate) enum CycleOutcome {
    Finished,
    Cancelled,
    Failed(String),
}

/// Cancellation requests from a `ProcessingHandle`.
///
/// A dropped handle closes the channel; the cycle then runs to completion.
pub(crate) struct CancelSignal {
    rx: broadcast::Receiver<()>,
    open: bool,
}

impl CancelSignal {
    pub(crate) fn new(rx: broadcast::Receiver<()>) -> Self {
        Self { rx, open: true }
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    async fn cancelled(&mut self) {
        loop {
            if !self.open {
                std::future::pending::<()>().await;
            }
            match self.rx.recv().await {
                Ok(()) | Err(RecvError::Lagged(_)) => return,
                Err(RecvError::Closed) => self.open = false,
            }
        }
    }
}

/// State captured at accept time and carried through the cycle.
pub(crate) struct ProgressCycle {
    pub(crate) store: StatusStore,
    pub(crate) service: Arc<dyn TrimService>,
    pub(crate) config: ProcessingConfig,
    pub(crate) file_id: String,
    pub(crate) stats: Option<ProcessingStats>,
}

impl ProgressCycle {
    /// Drive the record from `Processing` to a rest state.
    pub(crate) async fn run(self, mut cancel: CancelSignal) {
        let outcome = match self.config.mode {
            ProgressMode::Simulated => self.run_simulated(&mut cancel).await,
            ProgressMode::Poll => self.run_polling(&mut cancel).await,
        };

        match outcome {
            CycleOutcome::Finished => self.finalize(),
            CycleOutcome::Cancelled => {
                info!(file_id = %self.file_id, "Processing cancelled");
                self.fail(CANCELLED_MESSAGE.to_string());
            }
            CycleOutcome::Failed(message) => {
                warn!(file_id = %self.file_id, "{}", message);
                self.fail(message);
            }
        }
    }

    async fn run_simulated(&self, cancel: &mut CancelSignal) -> CycleOutcome {
        let period = Duration::from_millis(self.config.tick_interval_ms);
        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return CycleOutcome::Cancelled,
                _ = ticker.tick() => {
                    match self.store.advance_processing(self.config.progress_step) {
                        Ok(percent) if percent >= 100 => return CycleOutcome::Finished,
                        Ok(percent) => debug!(file_id = %self.file_id, percent, "Progress tick"),
                        Err(e) => return CycleOutcome::Failed(format!("Processing failed: {}", e)),
                    }
                }
            }
        }
    }

    async fn run_polling(&self, cancel: &mut CancelSignal) -> CycleOutcome {
        let base = Duration::from_millis(self.config.poll_interval_ms);
        let max = Duration::from_millis(self.config.poll_max_interval_ms);
        let limit = Duration::from_millis(self.config.poll_timeout_ms);
        let mut delay = base;
        let mut failures = 0u32;

        let deadline = sleep(limit);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return CycleOutcome::Cancelled,
                _ = &mut deadline => return Self::timed_out(limit),
                _ = sleep(delay) => {}
            }

            let polled = tokio::select! {
                _ = cancel.cancelled() => return CycleOutcome::Cancelled,
                _ = &mut deadline => return Self::timed_out(limit),
                polled = self.service.job_status(&self.file_id) => polled,
            };

            let moved = match polled {
                Ok(remote) => {
                    failures = 0;
                    match remote.status {
                        RemoteJobState::Completed => return CycleOutcome::Finished,
                        RemoteJobState::NotFound => {
                            let reason = if remote.message.is_empty() {
                                "job not found".to_string()
                            } else {
                                remote.message
                            };
                            return CycleOutcome::Failed(format!("Processing failed: {}", reason));
                        }
                        RemoteJobState::Ready
                        | RemoteJobState::Processing
                        | RemoteJobState::Unknown => {
                            let before = self.store.snapshot().progress_percent;
                            let message = (!remote.message.is_empty()).then_some(remote.message);
                            match self.store.report_processing_progress(
                                remote.progress.min(POLL_PROGRESS_CEILING),
                                message,
                            ) {
                                Ok(percent) => {
                                    debug!(file_id = %self.file_id, percent, "Polled progress");
                                    percent > before
                                }
                                Err(e) => {
                                    return CycleOutcome::Failed(format!(
                                        "Processing failed: {}",
                                        e
                                    ))
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        file_id = %self.file_id,
                        failures,
                        "Status poll failed: {}", e
                    );
                    if failures >= self.config.poll_max_failures {
                        return CycleOutcome::Failed(format!(
                            "Processing failed: status unavailable after {} attempts ({})",
                            failures,
                            e.detail().unwrap_or_else(|| e.to_string())
                        ));
                    }
                    false
                }
            };

            delay = if moved { base } else { (delay * 2).min(max) };
        }
    }

    fn timed_out(limit: Duration) -> CycleOutcome {
        CycleOutcome::Failed(format!(
            "Processing failed: job did not finish within {:?}",
            limit
        ))
    }

    fn finalize(&self) {
        let message = completion_message(self.stats.as_ref());
        let stats = self
            .stats
            .clone()
            .unwrap_or_else(ProcessingStats::unavailable);
        let output_ref = download_ref(&self.file_id);

        match self
            .store
            .complete_processing(output_ref.clone(), stats, message)
        {
            Ok(()) => info!(file_id = %self.file_id, output_ref = %output_ref, "Processing completed"),
            Err(e) => error!(file_id = %self.file_id, "Could not complete processing: {}", e),
        }
    }

    fn fail(&self, message: String) {
        if let Err(e) = self.store.processing_failed(message) {
            error!(file_id = %self.file_id, "Could not record processing failure: {}", e);
        }
    }
}
