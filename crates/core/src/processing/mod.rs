//! Processing stage.
//!
//! This module provides the `ProcessingOrchestrator`, which asks the remote
//! service to trim an uploaded file and then drives the status record to
//! completion with a progress cycle (simulated ticks or status polling).

mod cycle;
mod duration;
mod orchestrator;

pub use cycle::completion_message;
pub use duration::TargetDuration;
pub use orchestrator::{Canceller, ProcessingHandle, ProcessingOrchestrator};
