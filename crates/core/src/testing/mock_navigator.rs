//! Mock navigator for testing.

use std::sync::{Arc, Mutex};

use crate::download::Navigator;

/// Records every URL it is asked to open instead of opening it.
#[derive(Debug, Default, Clone)]
pub struct MockNavigator {
    visited: Arc<Mutex<Vec<String>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs opened so far, including failed attempts.
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Make subsequent navigations fail.
    pub fn fail_navigation(&self, fail: bool) {
        if let Ok(mut flag) = self.fail.lock() {
            *flag = fail;
        }
    }
}

impl Navigator for MockNavigator {
    fn name(&self) -> &str {
        "mock"
    }

    fn navigate(&self, url: &str) -> std::io::Result<()> {
        if let Ok(mut visited) = self.visited.lock() {
            visited.push(url.to_string());
        }
        if self.fail.lock().map(|f| *f).unwrap_or(false) {
            return Err(std::io::Error::other("no browser available"));
        }
        Ok(())
    }
}
