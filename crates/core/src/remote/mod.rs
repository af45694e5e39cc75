//! Remote trimming service abstraction.
//!
//! This module provides the `TrimService` trait covering the four endpoints the
//! workflow talks to (upload, process, status, download) and an HTTP
//! implementation built on reqwest.

mod http;
mod types;

pub use http::HttpTrimService;
pub use types::*;

/// Deterministic locator of the artifact produced for `file_id`.
pub fn download_ref(file_id: &str) -> String {
    format!("/api/download/{}", urlencoding::encode(file_id))
}
