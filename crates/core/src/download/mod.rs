//! Download stage.
//!
//! Fetches the artifact of a completed job and writes it next to the user's
//! other files. When that fails, the artifact URL is handed to a `Navigator`
//! (the system browser by default) as a best-effort fallback.

mod error;
mod manager;
mod navigator;

pub use error::DownloadError;
pub use manager::DownloadManager;
pub use navigator::{BrowserNavigator, Navigator};
