//! Direct navigation to an artifact URL, used as the download fallback.

/// Something that can hand a URL to the user outside this process.
pub trait Navigator: Send + Sync {
    /// Returns the name of this navigator implementation.
    fn name(&self) -> &str;

    /// Open `url`. Blocking; called off the async runtime.
    fn navigate(&self, url: &str) -> std::io::Result<()>;
}

/// Opens URLs with the system's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserNavigator;

impl Navigator for BrowserNavigator {
    fn name(&self) -> &str {
        "browser"
    }

    fn navigate(&self, url: &str) -> std::io::Result<()> {
        open::that(url)
    }
}
