//! Upload → process → download, wired around one status record.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::download::{DownloadError, DownloadManager, Navigator};
use crate::error::{ValidationError, WorkflowError};
use crate::processing::{ProcessingHandle, ProcessingOrchestrator, TargetDuration};
use crate::remote::TrimService;
use crate::status::{FileRecord, ProcessingStatus, StatusStore};
use crate::upload::{LocalVideo, UploadCoordinator};

/// The three workflow stages sharing one [`StatusStore`].
#[derive(Clone)]
pub struct Workflow {
    store: StatusStore,
    uploader: UploadCoordinator,
    orchestrator: ProcessingOrchestrator,
    downloader: DownloadManager,
}

impl Workflow {
    pub fn new(
        config: Config,
        service: Arc<dyn TrimService>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let store = StatusStore::new();
        info!(service = service.name(), mode = ?config.processing.mode, "Workflow ready");

        Self {
            uploader: UploadCoordinator::new(&config.upload, store.clone(), Arc::clone(&service)),
            orchestrator: ProcessingOrchestrator::new(
                config.processing,
                store.clone(),
                Arc::clone(&service),
            ),
            downloader: DownloadManager::new(config.download, service, navigator),
            store,
        }
    }

    pub fn store(&self) -> &StatusStore {
        &self.store
    }

    pub fn status(&self) -> ProcessingStatus {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingStatus> {
        self.store.subscribe()
    }

    /// Check a file against the upload rules without touching the record.
    pub fn validate(&self, video: &LocalVideo) -> Result<(), ValidationError> {
        self.uploader.validate(video)
    }

    pub async fn submit(&self, video: &LocalVideo) -> Result<FileRecord, WorkflowError> {
        self.uploader.submit(video).await
    }

    /// Process the last uploaded file.
    pub async fn start(&self, target: TargetDuration) -> Result<ProcessingHandle, WorkflowError> {
        let file_id = self
            .store
            .file_record()
            .map(|record| record.id)
            .ok_or(ValidationError::MissingFileId)?;
        self.orchestrator.start(&file_id, target.as_seconds()).await
    }

    /// Save the current artifact. The record is left as it is, even on failure.
    pub async fn download(&self) -> Result<PathBuf, DownloadError> {
        let status = self.store.snapshot();
        let file = self.store.file_record();
        self.downloader.download(&status, file.as_ref()).await
    }

    pub fn uploader(&self) -> &UploadCoordinator {
        &self.uploader
    }

    pub fn orchestrator(&self) -> &ProcessingOrchestrator {
        &self.orchestrator
    }

    pub fn downloader(&self) -> &DownloadManager {
        &self.downloader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::WorkflowState;
    use crate::testing::{fixtures, MockNavigator, MockTrimService};

    #[tokio::test]
    async fn test_start_without_upload() {
        let workflow = Workflow::new(
            Config::default(),
            Arc::new(MockTrimService::new()),
            Arc::new(MockNavigator::new()),
        );
        let err = workflow.start(TargetDuration::default()).await.err().unwrap();
        assert!(matches!(
            err,
            WorkflowError::Validation(ValidationError::MissingFileId)
        ));
        assert_eq!(workflow.status().state, WorkflowState::Idle);
    }

    #[tokio::test]
    async fn test_download_before_completion() {
        let service = Arc::new(MockTrimService::new());
        let workflow = Workflow::new(
            Config::default(),
            service.clone(),
            Arc::new(MockNavigator::new()),
        );
        workflow
            .submit(&fixtures::local_video("talk.mp4", 100))
            .await
            .unwrap();

        let before = workflow.status();
        assert!(matches!(
            workflow.download().await,
            Err(DownloadError::NotReady)
        ));
        assert_eq!(workflow.status(), before);
        assert!(service.fetched_refs().await.is_empty());
    }
}
