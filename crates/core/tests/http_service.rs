//! HTTP client integration tests against an in-process service.
//!
//! The router below answers the four endpoints the client uses with the
//! response shapes the real trimming service sends.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tempfile::TempDir;

use trimbee_core::{
    config::ServiceConfig,
    remote::{ProcessRequest, RemoteError, RemoteJobState, TrimService},
    testing::MockNavigator,
    Config, DownloadError, HttpTrimService, LocalVideo, TargetDuration, Workflow, WorkflowError,
    WorkflowState,
};

const ARTIFACT: &[u8] = b"trimmed video bytes";

#[derive(Clone, Default)]
struct Recorded {
    /// (file name, content type, byte count) per uploaded part.
    uploads: Arc<Mutex<Vec<(String, String, usize)>>>,
    process_bodies: Arc<Mutex<Vec<Value>>>,
}

fn error(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

async fn upload(State(recorded): State<Recorded>, mut multipart: Multipart) -> Response {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let Ok(bytes) = field.bytes().await else {
            return error(StatusCode::BAD_REQUEST, "Broken upload");
        };
        if name.ends_with(".bad") {
            return error(StatusCode::BAD_REQUEST, "Invalid file type");
        }
        recorded
            .uploads
            .lock()
            .unwrap()
            .push((name.clone(), content_type, bytes.len()));
        return Json(json!({
            "success": true,
            "file_id": "abc",
            "filename": "abc.mp4",
            "original_filename": name,
            "message": "File uploaded successfully"
        }))
        .into_response();
    }
    error(StatusCode::BAD_REQUEST, "No file uploaded")
}

async fn process(State(recorded): State<Recorded>, Json(body): Json<Value>) -> Response {
    recorded.process_bodies.lock().unwrap().push(body.clone());
    if body["file_id"] == "slow" {
        // Trimming happens before the service answers.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        return Json(json!({ "success": true, "file_id": "slow" })).into_response();
    }
    if body["file_id"] != "abc" {
        return error(StatusCode::NOT_FOUND, "File not found");
    }
    Json(json!({
        "success": true,
        "file_id": "abc",
        "status": "completed",
        "message": "Video processing completed",
        "result": {
            "processing_stats": {
                "processing_time_formatted": "1m30s",
                "original_size_formatted": "500MB",
                "processed_size_formatted": "120MB",
                "compression_ratio": 76.0
            }
        }
    }))
    .into_response()
}

async fn status(Path(file_id): Path<String>) -> Json<Value> {
    let body = match file_id.as_str() {
        "abc" => json!({
            "file_id": "abc",
            "status": "completed",
            "progress": 100,
            "message": "Video processing completed",
            "output_url": "/api/download/abc"
        }),
        "busy id" => json!({
            "file_id": file_id,
            "status": "processing",
            "progress": 45,
            "message": "AI is analyzing video content..."
        }),
        _ => json!({
            "file_id": file_id,
            "status": "not_found",
            "progress": 0,
            "message": "File not found"
        }),
    };
    Json(body)
}

async fn download(Path(file_id): Path<String>) -> Response {
    match file_id.as_str() {
        "abc" => ARTIFACT.into_response(),
        // Six small chunks, 300 ms apart.
        "slow" => Body::from_stream(futures::stream::unfold(0u8, |sent| async move {
            if sent == 6 {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
            Some((Ok::<_, std::io::Error>(b"chunk".to_vec()), sent + 1))
        }))
        .into_response(),
        "stalled" => {
            tokio::time::sleep(Duration::from_secs(3)).await;
            ARTIFACT.into_response()
        }
        _ => error(StatusCode::NOT_FOUND, "Processed file does not exist"),
    }
}

async fn spawn_server() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/api/upload", post(upload))
        .route("/api/process", post(process))
        .route("/api/status/{file_id}", get(status))
        .route("/api/download/{file_id}", get(download))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), recorded)
}

fn client(base_url: &str) -> HttpTrimService {
    HttpTrimService::new(&ServiceConfig {
        base_url: base_url.to_string(),
        connect_timeout_secs: 2,
        idle_timeout_secs: 1,
        process_timeout_secs: 10,
        status_timeout_secs: 5,
    })
    .unwrap()
}

async fn write_video(dir: &TempDir, name: &str, size: usize) -> LocalVideo {
    let path = dir.path().join(name);
    tokio::fs::write(&path, vec![7u8; size]).await.unwrap();
    LocalVideo::from_path(&path).await.unwrap()
}

#[tokio::test]
async fn test_workflow_over_http() {
    let (base_url, recorded) = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let video = write_video(&dir, "lecture.mp4", 600 * 1024).await;

    let mut config = Config::default();
    config.service.base_url = base_url.clone();
    config.processing.tick_interval_ms = 5;
    config.download.output_dir = dir.path().join("out");
    let navigator = Arc::new(MockNavigator::new());
    let workflow = Workflow::new(config, Arc::new(client(&base_url)), navigator.clone());

    let record = workflow.submit(&video).await.unwrap();
    assert_eq!(record.id, "abc");
    assert_eq!(workflow.status().progress_percent, 100);
    assert_eq!(
        recorded.uploads.lock().unwrap().clone(),
        vec![("lecture.mp4".to_string(), "video/mp4".to_string(), 600 * 1024)]
    );

    let status = workflow
        .start(TargetDuration::from_minutes(5).unwrap())
        .await
        .unwrap()
        .wait()
        .await;
    assert_eq!(status.state, WorkflowState::Completed);
    assert!(status.message.contains("compressed by 76.0%"), "{}", status.message);
    assert_eq!(
        recorded.process_bodies.lock().unwrap()[0],
        json!({ "file_id": "abc", "target_duration": 300 })
    );

    let path = workflow.download().await.unwrap();
    assert_eq!(path, dir.path().join("out").join("lecture_trimmed.mp4"));
    assert_eq!(tokio::fs::read(&path).await.unwrap(), ARTIFACT);
    assert!(navigator.visited().is_empty());
}

#[tokio::test]
async fn test_poll_mode_over_http() {
    let (base_url, _) = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let video = write_video(&dir, "talk.webm", 1024).await;

    let mut config = Config::default();
    config.service.base_url = base_url.clone();
    config.processing.mode = trimbee_core::ProgressMode::Poll;
    config.processing.poll_interval_ms = 5;
    config.processing.poll_max_interval_ms = 20;
    let workflow = Workflow::new(
        config,
        Arc::new(client(&base_url)),
        Arc::new(MockNavigator::new()),
    );

    workflow.submit(&video).await.unwrap();
    let status = workflow
        .start(TargetDuration::default())
        .await
        .unwrap()
        .wait()
        .await;
    assert_eq!(status.state, WorkflowState::Completed);
    assert_eq!(status.output_ref.as_deref(), Some("/api/download/abc"));
}

#[tokio::test]
async fn test_upload_error_detail_reaches_record() {
    let (base_url, _) = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let video = write_video(&dir, "clip.bad", 16)
        .await
        .with_media_type("video/mp4");

    let mut config = Config::default();
    config.service.base_url = base_url.clone();
    let workflow = Workflow::new(
        config,
        Arc::new(client(&base_url)),
        Arc::new(MockNavigator::new()),
    );

    let err = workflow.submit(&video).await.unwrap_err();
    assert!(matches!(err, WorkflowError::ServerRejection { .. }));
    let status = workflow.status();
    assert_eq!(status.state, WorkflowState::Failed);
    assert_eq!(status.message, "Upload failed: Invalid file type");
}

#[tokio::test]
async fn test_process_not_found_is_http_error() {
    let (base_url, _) = spawn_server().await;
    let service = client(&base_url);

    let err = service
        .begin_processing(&ProcessRequest {
            file_id: "missing".to_string(),
            target_duration_seconds: 60,
        })
        .await
        .unwrap_err();
    match err {
        RemoteError::Http { status, detail } => {
            assert_eq!(status, 404);
            assert_eq!(detail.as_deref(), Some("File not found"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_job_status_encodes_file_id() {
    let (base_url, _) = spawn_server().await;
    let service = client(&base_url);

    let status = service.job_status("busy id").await.unwrap();
    assert_eq!(status.status, RemoteJobState::Processing);
    assert_eq!(status.progress, 45);

    let status = service.job_status("gone").await.unwrap();
    assert_eq!(status.status, RemoteJobState::NotFound);
}

#[tokio::test]
async fn test_missing_artifact_falls_back_to_navigation() {
    let (base_url, _) = spawn_server().await;
    let dir = TempDir::new().unwrap();
    let navigator = Arc::new(MockNavigator::new());
    let manager = trimbee_core::DownloadManager::new(
        trimbee_core::config::DownloadConfig {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        },
        Arc::new(client(&base_url)),
        navigator.clone(),
    );

    let err = manager
        .fetch_and_save("/api/download/nope", Some("x.mp4"))
        .await
        .unwrap_err();
    match err {
        DownloadError::Fetch(RemoteError::Http { status, detail }) => {
            assert_eq!(status, 404);
            assert_eq!(detail.as_deref(), Some("Processed file does not exist"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        navigator.visited(),
        vec![format!("{}/api/download/nope", base_url)]
    );
    assert!(!dir.path().join("x_trimmed.mp4").exists());
}

#[tokio::test]
async fn test_slow_artifact_completes_while_data_keeps_moving() {
    let (base_url, _) = spawn_server().await;
    let service = client(&base_url);

    // 1.8 s in total, never more than 300 ms between chunks.
    let payload = service.fetch_artifact("/api/download/slow").await.unwrap();
    assert_eq!(payload, b"chunk".repeat(6));
}

#[tokio::test]
async fn test_stalled_artifact_times_out() {
    let (base_url, _) = spawn_server().await;
    let service = client(&base_url);

    let err = service
        .fetch_artifact("/api/download/stalled")
        .await
        .unwrap_err();
    assert!(matches!(err, RemoteError::Timeout), "unexpected error: {err:?}");
}

#[tokio::test]
async fn test_long_running_process_call_is_not_cut_by_idle_limit() {
    let (base_url, _) = spawn_server().await;
    let service = client(&base_url);

    let accept = service
        .begin_processing(&ProcessRequest {
            file_id: "slow".to_string(),
            target_duration_seconds: 60,
        })
        .await
        .unwrap();
    assert!(accept.success);
}
