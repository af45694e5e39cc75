//! Upload stage.
//!
//! Validates a local video (size ceiling, video media type) and transfers it
//! to the remote service as a single multipart payload, mirroring transfer
//! progress into the status record.

mod coordinator;
mod video;

pub use coordinator::UploadCoordinator;
pub use video::{guess_media_type, LocalVideo};
