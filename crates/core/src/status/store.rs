//! The owned status container.
//!
//! `StatusStore` is the single source of truth for the workflow record. It is a
//! cheap clone around shared state; every component that needs the record gets
//! a clone and may only request one of the transitions below. Observers follow
//! changes through a `watch` channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::types::{FileRecord, ProcessingStats, ProcessingStatus, StatusError, WorkflowState};

const UPLOADING_MESSAGE: &str = "Uploading video file...";
const UPLOADED_MESSAGE: &str = "File uploaded, ready to process";
const ANALYZING_MESSAGE: &str = "AI is analyzing video content...";

/// States from which a fresh upload may begin.
const UPLOAD_FROM: &[WorkflowState] = &[
    WorkflowState::Idle,
    WorkflowState::Completed,
    WorkflowState::Failed,
];

/// States from which a processing request may be issued.
const START_FROM: &[WorkflowState] = &[
    WorkflowState::Idle,
    WorkflowState::Completed,
    WorkflowState::Failed,
];

#[derive(Debug)]
struct Inner {
    status: watch::Sender<ProcessingStatus>,
    file: watch::Sender<Option<FileRecord>>,
    busy: AtomicBool,
}

/// Owner of the single workflow record.
#[derive(Debug, Clone)]
pub struct StatusStore {
    inner: Arc<Inner>,
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks the workflow busy until dropped.
///
/// Held by `submit` for the whole transfer and by `start` until the progress
/// cycle has finished.
#[derive(Debug)]
pub struct BusyGuard {
    inner: Arc<Inner>,
    operation: &'static str,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.inner.busy.store(false, Ordering::SeqCst);
        debug!(operation = self.operation, "Workflow released");
    }
}

impl StatusStore {
    /// Create a store holding a fresh `Idle` record.
    pub fn new() -> Self {
        let (status, _) = watch::channel(ProcessingStatus::initial());
        let (file, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                status,
                file,
                busy: AtomicBool::new(false),
            }),
        }
    }

    /// Current record.
    pub fn snapshot(&self) -> ProcessingStatus {
        self.inner.status.borrow().clone()
    }

    /// Current state only.
    pub fn state(&self) -> WorkflowState {
        self.inner.status.borrow().state
    }

    /// Follow every change of the record.
    pub fn subscribe(&self) -> watch::Receiver<ProcessingStatus> {
        self.inner.status.subscribe()
    }

    /// The last acknowledged upload, if any.
    pub fn file_record(&self) -> Option<FileRecord> {
        self.inner.file.borrow().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    /// Claim the workflow for one stage. Fails if another stage holds it.
    pub fn try_claim(&self, operation: &'static str) -> Result<BusyGuard, StatusError> {
        if self.inner.busy.swap(true, Ordering::SeqCst) {
            return Err(StatusError::Busy { operation });
        }
        debug!(operation, "Workflow claimed");
        Ok(BusyGuard {
            inner: Arc::clone(&self.inner),
            operation,
        })
    }

    /// Check that a processing request may be issued now.
    pub fn ensure_can_start(&self) -> Result<(), StatusError> {
        let state = self.state();
        if START_FROM.contains(&state) {
            Ok(())
        } else {
            Err(StatusError::IllegalTransition {
                state,
                operation: "start processing",
            })
        }
    }

    /// Apply `update` if the record is in one of `allowed`, notifying observers.
    fn transition<F>(
        &self,
        operation: &'static str,
        allowed: &[WorkflowState],
        update: F,
    ) -> Result<(), StatusError>
    where
        F: FnOnce(&mut ProcessingStatus),
    {
        let mut result = Ok(());
        self.inner.status.send_if_modified(|status| {
            if !allowed.contains(&status.state) {
                result = Err(StatusError::IllegalTransition {
                    state: status.state,
                    operation,
                });
                return false;
            }
            let from = status.state;
            update(status);
            debug!(operation, from = %from, to = %status.state, progress = status.progress_percent, "Status transition");
            true
        });
        result
    }

    /// Any rest state -> Uploading. Replaces the whole record and discards the
    /// previous file record.
    pub fn begin_upload(&self) -> Result<(), StatusError> {
        self.transition("begin upload", UPLOAD_FROM, |status| {
            *status = ProcessingStatus {
                state: WorkflowState::Uploading,
                message: UPLOADING_MESSAGE.to_string(),
                ..ProcessingStatus::initial()
            };
        })?;
        self.inner.file.send_replace(None);
        Ok(())
    }

    /// Apply transfer progress. Lower values than the current one are ignored.
    pub fn upload_progress(&self, percent: u8) -> Result<u8, StatusError> {
        let mut applied = 0;
        self.transition("report upload progress", &[WorkflowState::Uploading], |status| {
            status.progress_percent = status.progress_percent.max(percent.min(100));
            applied = status.progress_percent;
        })?;
        Ok(applied)
    }

    /// Uploading -> Idle with the acknowledged file.
    pub fn upload_succeeded(&self, record: FileRecord) -> Result<(), StatusError> {
        let file_id = record.id.clone();
        self.transition("finish upload", &[WorkflowState::Uploading], |status| {
            *status = ProcessingStatus {
                file_id,
                state: WorkflowState::Idle,
                progress_percent: 100,
                message: UPLOADED_MESSAGE.to_string(),
                output_ref: None,
                stats: None,
            };
        })?;
        self.inner.file.send_replace(Some(record));
        Ok(())
    }

    /// Uploading -> Failed.
    pub fn upload_failed(&self, message: impl Into<String>) -> Result<(), StatusError> {
        let message = message.into();
        self.transition("fail upload", &[WorkflowState::Uploading], |status| {
            status.state = WorkflowState::Failed;
            status.message = message;
        })
    }

    /// Rest state -> Processing once the server accepted the job.
    pub fn processing_accepted(&self) -> Result<(), StatusError> {
        self.transition("accept processing", START_FROM, |status| {
            status.state = WorkflowState::Processing;
            status.progress_percent = 0;
            status.message = ANALYZING_MESSAGE.to_string();
            status.output_ref = None;
            status.stats = None;
        })
    }

    /// Rest state -> Failed when the processing request was rejected or lost.
    pub fn processing_rejected(&self, message: impl Into<String>) -> Result<(), StatusError> {
        let message = message.into();
        self.transition("reject processing", START_FROM, |status| {
            status.state = WorkflowState::Failed;
            status.message = message;
            status.output_ref = None;
            status.stats = None;
        })
    }

    /// One firing of the progress cycle: add `step`, clamped at 100.
    pub fn advance_processing(&self, step: u8) -> Result<u8, StatusError> {
        let mut applied = 0;
        self.transition("advance processing", &[WorkflowState::Processing], |status| {
            let next = status.progress_percent.saturating_add(step).min(100);
            status.progress_percent = next;
            status.message = format!("{} {}%", ANALYZING_MESSAGE, next);
            applied = next;
        })?;
        Ok(applied)
    }

    /// Apply progress reported by the remote job. Never moves backwards.
    pub fn report_processing_progress(
        &self,
        percent: u8,
        message: Option<String>,
    ) -> Result<u8, StatusError> {
        let mut applied = 0;
        self.transition(
            "report processing progress",
            &[WorkflowState::Processing],
            |status| {
                let next = status.progress_percent.max(percent.min(100));
                status.progress_percent = next;
                status.message =
                    message.unwrap_or_else(|| format!("{} {}%", ANALYZING_MESSAGE, next));
                applied = next;
            },
        )?;
        Ok(applied)
    }

    /// Processing -> Completed. The only place `output_ref` and `stats` are set.
    pub fn complete_processing(
        &self,
        output_ref: String,
        stats: ProcessingStats,
        message: String,
    ) -> Result<(), StatusError> {
        self.transition("complete processing", &[WorkflowState::Processing], |status| {
            status.state = WorkflowState::Completed;
            status.progress_percent = 100;
            status.message = message;
            status.output_ref = Some(output_ref);
            status.stats = Some(stats);
        })
    }

    /// Processing -> Failed after the job was accepted.
    pub fn processing_failed(&self, message: impl Into<String>) -> Result<(), StatusError> {
        let message = message.into();
        self.transition("fail processing", &[WorkflowState::Processing], |status| {
            status.state = WorkflowState::Failed;
            status.message = message;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(id: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            display_name: "talk.mp4".to_string(),
            size_bytes: 1024,
            uploaded_at: Utc::now(),
        }
    }

    fn assert_invariants(status: &ProcessingStatus) {
        let completed = status.state == WorkflowState::Completed;
        assert_eq!(status.output_ref.is_some(), completed);
        assert_eq!(status.stats.is_some(), completed);
        assert!(status.progress_percent <= 100);
    }

    fn uploaded_store(id: &str) -> StatusStore {
        let store = StatusStore::new();
        store.begin_upload().unwrap();
        store.upload_succeeded(record(id)).unwrap();
        store
    }

    #[test]
    fn test_new_store_is_idle() {
        let store = StatusStore::new();
        let status = store.snapshot();
        assert_eq!(status.state, WorkflowState::Idle);
        assert_eq!(status.progress_percent, 0);
        assert!(store.file_record().is_none());
        assert!(!store.is_busy());
    }

    #[test]
    fn test_upload_success_path() {
        let store = StatusStore::new();
        store.begin_upload().unwrap();
        assert_eq!(store.state(), WorkflowState::Uploading);

        store.upload_progress(40).unwrap();
        store.upload_succeeded(record("abc")).unwrap();

        let status = store.snapshot();
        assert_eq!(status.state, WorkflowState::Idle);
        assert_eq!(status.progress_percent, 100);
        assert_eq!(status.file_id, "abc");
        assert_eq!(store.file_record().unwrap().id, "abc");
        assert_invariants(&status);
    }

    #[test]
    fn test_upload_progress_is_monotonic() {
        let store = StatusStore::new();
        store.begin_upload().unwrap();
        assert_eq!(store.upload_progress(30).unwrap(), 30);
        assert_eq!(store.upload_progress(10).unwrap(), 30);
        assert_eq!(store.upload_progress(250).unwrap(), 100);
    }

    #[test]
    fn test_upload_progress_outside_uploading_is_rejected() {
        let store = StatusStore::new();
        let err = store.upload_progress(50).unwrap_err();
        assert!(matches!(
            err,
            StatusError::IllegalTransition {
                state: WorkflowState::Idle,
                ..
            }
        ));
        assert_eq!(store.snapshot().progress_percent, 0);
    }

    #[test]
    fn test_upload_failure_keeps_progress() {
        let store = StatusStore::new();
        store.begin_upload().unwrap();
        store.upload_progress(55).unwrap();
        store.upload_failed("Upload failed: boom").unwrap();

        let status = store.snapshot();
        assert_eq!(status.state, WorkflowState::Failed);
        assert_eq!(status.progress_percent, 55);
        assert_eq!(status.message, "Upload failed: boom");
        assert!(store.file_record().is_none());
    }

    #[test]
    fn test_new_upload_resets_completed_record() {
        let store = uploaded_store("abc");
        store.processing_accepted().unwrap();
        store
            .complete_processing(
                "/api/download/abc".to_string(),
                ProcessingStats::unavailable(),
                "done".to_string(),
            )
            .unwrap();
        assert_invariants(&store.snapshot());

        store.begin_upload().unwrap();
        let status = store.snapshot();
        assert_eq!(status.state, WorkflowState::Uploading);
        assert!(status.file_id.is_empty());
        assert_eq!(status.progress_percent, 0);
        assert!(store.file_record().is_none());
        assert_invariants(&status);
    }

    #[test]
    fn test_begin_upload_during_processing_is_illegal() {
        let store = uploaded_store("abc");
        store.processing_accepted().unwrap();
        assert!(store.begin_upload().is_err());
        assert_eq!(store.state(), WorkflowState::Processing);
        assert!(store.file_record().is_some());
    }

    #[test]
    fn test_processing_cycle_to_completion() {
        let store = uploaded_store("abc");
        store.processing_accepted().unwrap();
        assert_eq!(store.snapshot().progress_percent, 0);

        let mut last = 0;
        while last < 100 {
            let next = store.advance_processing(30).unwrap();
            assert!(next >= last);
            last = next;
            assert_invariants(&store.snapshot());
        }
        assert_eq!(last, 100);
        assert!(store.snapshot().message.ends_with("100%"));

        store
            .complete_processing(
                "/api/download/abc".to_string(),
                ProcessingStats::new("1m30s", "500MB", "120MB", 76.0),
                "done".to_string(),
            )
            .unwrap();
        let status = store.snapshot();
        assert_eq!(status.state, WorkflowState::Completed);
        assert_eq!(status.output_ref.as_deref(), Some("/api/download/abc"));
        assert_invariants(&status);
    }

    #[test]
    fn test_reported_progress_never_decreases() {
        let store = uploaded_store("abc");
        store.processing_accepted().unwrap();
        assert_eq!(store.report_processing_progress(60, None).unwrap(), 60);
        assert_eq!(
            store
                .report_processing_progress(20, Some("still going".to_string()))
                .unwrap(),
            60
        );
        assert_eq!(store.snapshot().message, "still going");
    }

    #[test]
    fn test_processing_rejected_from_idle() {
        let store = uploaded_store("abc");
        store.processing_rejected("Processing failed: nope").unwrap();
        let status = store.snapshot();
        assert_eq!(status.state, WorkflowState::Failed);
        assert_eq!(status.file_id, "abc");
        assert_invariants(&status);
    }

    #[test]
    fn test_complete_requires_processing() {
        let store = uploaded_store("abc");
        let result = store.complete_processing(
            "/api/download/abc".to_string(),
            ProcessingStats::unavailable(),
            "done".to_string(),
        );
        assert!(result.is_err());
        assert_invariants(&store.snapshot());
    }

    #[test]
    fn test_processing_failed_after_accept() {
        let store = uploaded_store("abc");
        store.processing_accepted().unwrap();
        store.advance_processing(10).unwrap();
        store.processing_failed("Processing cancelled").unwrap();
        let status = store.snapshot();
        assert_eq!(status.state, WorkflowState::Failed);
        assert_invariants(&status);
    }

    #[test]
    fn test_busy_guard_is_exclusive_and_released_on_drop() {
        let store = StatusStore::new();
        let guard = store.try_claim("upload").unwrap();
        assert!(store.is_busy());
        assert_eq!(
            store.try_claim("start processing").unwrap_err(),
            StatusError::Busy {
                operation: "start processing"
            }
        );
        drop(guard);
        assert!(!store.is_busy());
        assert!(store.try_claim("start processing").is_ok());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let store = StatusStore::new();
        let mut rx = store.subscribe();
        store.begin_upload().unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().state, WorkflowState::Uploading);
    }

    #[test]
    fn test_ensure_can_start() {
        let store = StatusStore::new();
        assert!(store.ensure_can_start().is_ok());
        store.begin_upload().unwrap();
        assert!(store.ensure_can_start().is_err());
    }
}
