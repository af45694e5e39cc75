//! Workflow status record and its state machine.
//!
//! States: idle -> uploading -> idle (file acknowledged) -> processing ->
//! completed, with failed reachable from uploading, from a rejected start,
//! and from processing when a polled job disappears or is cancelled. A new
//! upload resets the record from any rest state.

mod store;
mod types;

pub use store::{BusyGuard, StatusStore};
pub use types::*;
