//! Download manager: fetch the finished artifact and save it locally.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::DownloadConfig;
use crate::remote::TrimService;
use crate::status::{FileRecord, ProcessingStatus, WorkflowState};

use super::{DownloadError, Navigator};

/// Retrieves finished artifacts, with a best-effort fallback to direct navigation.
#[derive(Clone)]
pub struct DownloadManager {
    service: Arc<dyn TrimService>,
    navigator: Arc<dyn Navigator>,
    config: DownloadConfig,
}

impl DownloadManager {
    pub fn new(
        config: DownloadConfig,
        service: Arc<dyn TrimService>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            service,
            navigator,
            config,
        }
    }

    /// Retrieve the artifact payload.
    pub async fn fetch(&self, output_ref: &str) -> Result<Vec<u8>, DownloadError> {
        let payload = self
            .service
            .fetch_artifact(output_ref)
            .await
            .map_err(DownloadError::Fetch)?;
        debug!(output_ref, bytes = payload.len(), "Artifact fetched");
        Ok(payload)
    }

    /// File name for the saved artifact.
    ///
    /// Uses the original name up to its first `.` plus the configured suffix and
    /// extension, or the configured default name when no usable name is known.
    pub fn artifact_name(&self, original_name: Option<&str>) -> String {
        let base = original_name
            .and_then(|name| Path::new(name).file_name())
            .and_then(|name| name.to_str())
            .and_then(|name| name.split('.').next())
            .map(str::trim)
            .filter(|base| !base.is_empty());

        match base {
            Some(base) => format!("{}{}.{}", base, self.config.suffix, self.config.extension),
            None => self.config.default_name.clone(),
        }
    }

    /// Write `payload` into the output directory. Returns the written path.
    pub async fn save(
        &self,
        payload: &[u8],
        original_name: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let dir = &self.config.output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|source| DownloadError::Save {
                path: dir.clone(),
                source,
            })?;

        let path = dir.join(self.artifact_name(original_name));
        tokio::fs::write(&path, payload)
            .await
            .map_err(|source| DownloadError::Save {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), bytes = payload.len(), "Artifact saved");
        Ok(path)
    }

    /// Fetch and save; on any failure try the direct-navigation fallback and
    /// return the original error.
    pub async fn fetch_and_save(
        &self,
        output_ref: &str,
        original_name: Option<&str>,
    ) -> Result<PathBuf, DownloadError> {
        let result = match self.fetch(output_ref).await {
            Ok(payload) => self.save(&payload, original_name).await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!(output_ref, "{}", e);
            self.fallback(output_ref).await;
        }
        result
    }

    /// Download the artifact of a completed record. Never changes the record.
    pub async fn download(
        &self,
        status: &ProcessingStatus,
        file: Option<&FileRecord>,
    ) -> Result<PathBuf, DownloadError> {
        let output_ref = match (&status.state, &status.output_ref) {
            (WorkflowState::Completed, Some(output_ref)) => output_ref,
            _ => return Err(DownloadError::NotReady),
        };
        let original_name = file
            .filter(|f| f.id == status.file_id)
            .map(|f| f.display_name.as_str());

        self.fetch_and_save(output_ref, original_name).await
    }

    /// Best effort: errors are logged, never returned.
    async fn fallback(&self, output_ref: &str) {
        if !self.config.browser_fallback {
            debug!("Browser fallback disabled");
            return;
        }

        let url = self.service.artifact_url(output_ref);
        let navigator = Arc::clone(&self.navigator);
        let target = url.clone();
        match tokio::task::spawn_blocking(move || navigator.navigate(&target)).await {
            Ok(Ok(())) => info!(url = %url, navigator = self.navigator.name(), "Opened artifact URL directly"),
            Ok(Err(e)) => warn!(url = %url, "Direct navigation failed: {}", e),
            Err(e) => warn!(url = %url, "Direct navigation task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteError;
    use crate::status::{ProcessingStats, StatusStore};
    use crate::testing::{MockNavigator, MockTrimService};
    use chrono::Utc;
    use tempfile::TempDir;

    struct Harness {
        service: Arc<MockTrimService>,
        navigator: Arc<MockNavigator>,
        manager: DownloadManager,
        dir: TempDir,
    }

    fn harness(browser_fallback: bool) -> Harness {
        let dir = TempDir::new().unwrap();
        let service = Arc::new(MockTrimService::new());
        let navigator = Arc::new(MockNavigator::new());
        let config = DownloadConfig {
            output_dir: dir.path().join("out"),
            browser_fallback,
            ..Default::default()
        };
        let manager = DownloadManager::new(config, service.clone(), navigator.clone());
        Harness {
            service,
            navigator,
            manager,
            dir,
        }
    }

    fn completed(file_id: &str) -> (ProcessingStatus, FileRecord) {
        let record = FileRecord {
            id: file_id.to_string(),
            display_name: "lecture.final.mov".to_string(),
            size_bytes: 1000,
            uploaded_at: Utc::now(),
        };
        let store = StatusStore::new();
        store.begin_upload().unwrap();
        store.upload_succeeded(record.clone()).unwrap();
        store.processing_accepted().unwrap();
        store
            .complete_processing(
                format!("/api/download/{}", file_id),
                ProcessingStats::unavailable(),
                "done".to_string(),
            )
            .unwrap();
        (store.snapshot(), record)
    }

    #[test]
    fn test_artifact_name() {
        let h = harness(true);
        assert_eq!(
            h.manager.artifact_name(Some("lecture.final.mov")),
            "lecture_trimmed.mp4"
        );
        assert_eq!(h.manager.artifact_name(Some("talk")), "talk_trimmed.mp4");
        assert_eq!(
            h.manager.artifact_name(Some("/home/me/clip.mp4")),
            "clip_trimmed.mp4"
        );
        assert_eq!(h.manager.artifact_name(Some(".hidden")), "trimbee_result.mp4");
        assert_eq!(h.manager.artifact_name(None), "trimbee_result.mp4");
    }

    #[tokio::test]
    async fn test_download_completed_record() {
        let h = harness(true);
        h.service.set_artifact(b"trimmed-bytes".to_vec()).await;
        let (status, record) = completed("abc");

        let path = h.manager.download(&status, Some(&record)).await.unwrap();

        assert_eq!(path, h.dir.path().join("out").join("lecture_trimmed.mp4"));
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"trimmed-bytes");
        assert_eq!(h.service.fetched_refs().await, vec!["/api/download/abc"]);
        assert!(h.navigator.visited().is_empty());
    }

    #[tokio::test]
    async fn test_download_requires_completed_record() {
        let h = harness(true);
        let status = StatusStore::new().snapshot();
        let err = h.manager.download(&status, None).await.unwrap_err();
        assert!(matches!(err, DownloadError::NotReady));
        assert!(h.service.fetched_refs().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_attempts_fallback() {
        let h = harness(true);
        h.service
            .set_next_fetch_error(RemoteError::Http {
                status: 404,
                detail: Some("Processed file does not exist".to_string()),
            })
            .await;
        let (status, record) = completed("abc");

        let err = h.manager.download(&status, Some(&record)).await.unwrap_err();

        assert!(matches!(err, DownloadError::Fetch(_)));
        assert_eq!(
            h.navigator.visited(),
            vec!["http://mock.trim/api/download/abc".to_string()]
        );
    }

    #[tokio::test]
    async fn test_fallback_errors_are_swallowed() {
        let h = harness(true);
        h.navigator.fail_navigation(true);
        h.service.set_next_fetch_error(RemoteError::Timeout).await;

        let err = h
            .manager
            .fetch_and_save("/api/download/abc", None)
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Fetch(RemoteError::Timeout)));
        assert_eq!(h.navigator.visited().len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_disabled() {
        let h = harness(false);
        h.service.set_next_fetch_error(RemoteError::Timeout).await;
        h.manager
            .fetch_and_save("/api/download/abc", None)
            .await
            .unwrap_err();
        assert!(h.navigator.visited().is_empty());
    }

    #[tokio::test]
    async fn test_save_failure_attempts_fallback() {
        let dir = TempDir::new().unwrap();
        // A file where the output directory should be.
        let blocker = dir.path().join("out");
        std::fs::write(&blocker, b"x").unwrap();

        let service = Arc::new(MockTrimService::new());
        let navigator = Arc::new(MockNavigator::new());
        let manager = DownloadManager::new(
            DownloadConfig {
                output_dir: blocker,
                ..Default::default()
            },
            service,
            navigator.clone(),
        );

        let err = manager
            .fetch_and_save("/api/download/abc", Some("a.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Save { .. }));
        assert_eq!(navigator.visited().len(), 1);
    }

    #[tokio::test]
    async fn test_download_ignores_foreign_file_record() {
        let h = harness(true);
        let (status, mut record) = completed("abc");
        record.id = "other".to_string();

        let path = h.manager.download(&status, Some(&record)).await.unwrap();
        assert!(path.ends_with("trimbee_result.mp4"));
    }
}
