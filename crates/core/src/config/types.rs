use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Remote trimming service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    /// Service root URL (e.g., "http://localhost:8000")
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Connect timeout in seconds (default: 10)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Longest pause allowed while an upload or artifact download is moving
    /// data, in seconds (default: 120)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Whole-request limit for the process call, which trims before it
    /// answers, in seconds (default: 3600)
    #[serde(default = "default_process_timeout")]
    pub process_timeout_secs: u64,
    /// Whole-request limit for one status poll, in seconds (default: 30)
    #[serde(default = "default_status_timeout")]
    pub status_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_secs: default_connect_timeout(),
            idle_timeout_secs: default_idle_timeout(),
            process_timeout_secs: default_process_timeout(),
            status_timeout_secs: default_status_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    120
}

fn default_process_timeout() -> u64 {
    3600
}

fn default_status_timeout() -> u64 {
    30
}

/// Upload configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Files at or above this size are rejected before any transfer.
    #[serde(default = "default_max_size")]
    pub max_size_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size(),
        }
    }
}

/// 2 GiB
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

fn default_max_size() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

/// How processing progress is reported once a job is accepted.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMode {
    /// Fixed-cadence local approximation.
    #[default]
    Simulated,
    /// Poll the status endpoint with backoff.
    Poll,
}

/// Processing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    #[serde(default)]
    pub mode: ProgressMode,
    /// Cadence of the simulated progress cycle (milliseconds).
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Points added per simulated tick.
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,
    /// Initial delay between status polls (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Upper bound for the poll backoff (milliseconds).
    #[serde(default = "default_poll_max_interval")]
    pub poll_max_interval_ms: u64,
    /// Consecutive failed polls tolerated before the job is given up.
    #[serde(default = "default_poll_max_failures")]
    pub poll_max_failures: u32,
    /// Overall limit on waiting for a polled job to complete (milliseconds).
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_ms: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            mode: ProgressMode::default(),
            tick_interval_ms: default_tick_interval(),
            progress_step: default_progress_step(),
            poll_interval_ms: default_poll_interval(),
            poll_max_interval_ms: default_poll_max_interval(),
            poll_max_failures: default_poll_max_failures(),
            poll_timeout_ms: default_poll_timeout(),
        }
    }
}

fn default_tick_interval() -> u64 {
    300
}

fn default_progress_step() -> u8 {
    10
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_poll_max_interval() -> u64 {
    10_000
}

fn default_poll_max_failures() -> u32 {
    5
}

/// 30 minutes
fn default_poll_timeout() -> u64 {
    30 * 60 * 1000
}

/// Download configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Directory the artifact is written into.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Appended to the original base name.
    #[serde(default = "default_suffix")]
    pub suffix: String,
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Used when the original file name is unknown.
    #[serde(default = "default_artifact_name")]
    pub default_name: String,
    /// Open the artifact URL in a browser when fetch or save fails.
    #[serde(default = "default_browser_fallback")]
    pub browser_fallback: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            suffix: default_suffix(),
            extension: default_extension(),
            default_name: default_artifact_name(),
            browser_fallback: default_browser_fallback(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_suffix() -> String {
    "_trimmed".to_string()
}

fn default_extension() -> String {
    "mp4".to_string()
}

fn default_artifact_name() -> String {
    "trimbee_result.mp4".to_string()
}

fn default_browser_fallback() -> bool {
    true
}
