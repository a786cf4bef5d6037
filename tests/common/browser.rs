//! Browser opener that records URLs instead of spawning anything

use async_trait::async_trait;
use formation_mcp::workflows::{BrowserOpener, BrowserOutcome};
use std::sync::Mutex;

#[derive(Default)]
pub struct RecordingBrowser {
    opened: Mutex<Vec<String>>,
    fail_with: Option<String>,
}

impl RecordingBrowser {
    /// An opener whose every attempt fails with `error`.
    pub fn failing(error: &str) -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            fail_with: Some(error.to_string()),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserOpener for RecordingBrowser {
    async fn open(&self, url: &str) -> BrowserOutcome {
        match &self.fail_with {
            Some(error) => BrowserOutcome::failed(url, error.clone()),
            None => {
                self.opened.lock().unwrap().push(url.to_string());
                BrowserOutcome::opened(url)
            }
        }
    }
}
