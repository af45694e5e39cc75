//! Local video files offered for upload.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const VIDEO_PREFIX: &str = "video/";
const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// A file on disk, as the upload coordinator sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalVideo {
    pub path: PathBuf,
    /// Name shown to the user and sent as the multipart file name.
    pub display_name: String,
    pub size_bytes: u64,
    /// Declared media type, e.g. `video/mp4`.
    pub media_type: String,
}

impl LocalVideo {
    pub fn new(
        path: impl Into<PathBuf>,
        display_name: impl Into<String>,
        size_bytes: u64,
        media_type: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            display_name: display_name.into(),
            size_bytes,
            media_type: media_type.into(),
        }
    }

    /// Describe a file from disk, guessing its media type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::new(
            path,
            display_name,
            metadata.len(),
            guess_media_type(path),
        ))
    }

    /// Override the guessed media type.
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = media_type.into();
        self
    }

    pub fn is_video(&self) -> bool {
        self.media_type
            .to_ascii_lowercase()
            .starts_with(VIDEO_PREFIX)
    }
}

/// Media type for common video container extensions.
pub fn guess_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("m4v") => "video/x-m4v",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("wmv") => "video/x-ms-wmv",
        Some("flv") => "video/x-flv",
        Some("mpeg") | Some("mpg") => "video/mpeg",
        Some("ts") => "video/mp2t",
        Some("3gp") => "video/3gpp",
        _ => FALLBACK_MEDIA_TYPE,
    }
}
