use crate::{RelayError, RelayResult};
use tracing::debug;

/// Opens URLs for the user. Swapped out in tests.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> RelayResult<()>;
}

/// The user's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> RelayResult<()> {
        debug!(url = %url, "Opening browser");
        open::that(url).map_err(|e| RelayError::Browser(e.to_string()))
    }
}

/// Records opened URLs instead of launching anything.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Default)]
pub struct RecordingBrowser {
    urls: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[cfg(any(test, feature = "test-util"))]
impl BrowserOpener for RecordingBrowser {
    fn open(&self, url: &str) -> RelayResult<()> {
        self.urls.lock().push(url.to_string());
        Ok(())
    }
}
