//! Types for the workflow status record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by illegal or conflicting transitions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatusError {
    /// Another upload or processing stage holds the workflow.
    #[error("Cannot {operation}: another workflow stage is still running")]
    Busy { operation: &'static str },

    /// The transition is not legal from the current state.
    #[error("Cannot {operation} while {state}")]
    IllegalTransition {
        state: WorkflowState,
        operation: &'static str,
    },
}

/// Lifecycle state of the single workflow record.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    #[default]
    Idle,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl WorkflowState {
    /// Returns true for the rest states a workflow ends in.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowState::Completed | WorkflowState::Failed)
    }

    /// Returns true while a remote stage is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, WorkflowState::Uploading | WorkflowState::Processing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowState::Idle => "idle",
            WorkflowState::Uploading => "uploading",
            WorkflowState::Processing => "processing",
            WorkflowState::Completed => "completed",
            WorkflowState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result statistics reported by the remote job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingStats {
    pub elapsed_formatted: String,
    pub original_size_formatted: String,
    pub processed_size_formatted: String,
    /// Size reduction in percent, never negative.
    pub compression_ratio_percent: f64,
}

impl ProcessingStats {
    pub fn new(
        elapsed_formatted: impl Into<String>,
        original_size_formatted: impl Into<String>,
        processed_size_formatted: impl Into<String>,
        compression_ratio_percent: f64,
    ) -> Self {
        let ratio = if compression_ratio_percent.is_finite() {
            compression_ratio_percent.max(0.0)
        } else {
            0.0
        };
        Self {
            elapsed_formatted: elapsed_formatted.into(),
            original_size_formatted: original_size_formatted.into(),
            processed_size_formatted: processed_size_formatted.into(),
            compression_ratio_percent: ratio,
        }
    }

    /// Placeholder used when the server accepted a job without statistics.
    pub fn unavailable() -> Self {
        Self::new("unknown", "unknown", "unknown", 0.0)
    }
}

/// A file the remote service acknowledged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    /// Server-assigned identifier.
    pub id: String,
    pub display_name: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// The single mutable workflow record.
///
/// Only [`StatusStore`](super::StatusStore) transitions build or change it, which
/// keeps `output_ref` and `stats` present exactly when the state is `Completed`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessingStatus {
    /// Empty until an upload succeeds.
    pub file_id: String,
    pub state: WorkflowState,
    pub progress_percent: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<ProcessingStats>,
}

pub(crate) const WAITING_FOR_UPLOAD: &str = "Waiting for a video file";

impl ProcessingStatus {
    pub(crate) fn initial() -> Self {
        Self {
            file_id: String::new(),
            state: WorkflowState::Idle,
            progress_percent: 0,
            message: WAITING_FOR_UPLOAD.to_string(),
            output_ref: None,
            stats: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state == WorkflowState::Completed
    }
}
