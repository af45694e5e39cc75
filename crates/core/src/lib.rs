pub mod config;
pub mod download;
pub mod error;
pub mod processing;
pub mod remote;
pub mod status;
pub mod testing;
pub mod upload;
pub mod workflow;

pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config,
    ConfigError, ProgressMode,
};
pub use download::{BrowserNavigator, DownloadError, DownloadManager, Navigator};
pub use error::{ValidationError, WorkflowError};
pub use processing::{completion_message, ProcessingHandle, ProcessingOrchestrator, TargetDuration};
pub use remote::{download_ref, HttpTrimService, RemoteError, RemoteJobState, RemoteJobStatus, TrimService};
pub use status::{FileRecord, ProcessingStats, ProcessingStatus, StatusError, StatusStore, WorkflowState};
pub use upload::{LocalVideo, UploadCoordinator};
pub use workflow::Workflow;
