//! Opening analysis URLs in the user's browser.

use async_trait::async_trait;
use serde::Serialize;
use tokio::process::Command;
use tracing::{debug, warn};

/// Result of a best-effort browser launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserOutcome {
    pub url: String,
    pub opened: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BrowserOutcome {
    pub fn opened(url: &str) -> Self {
        Self {
            url: url.to_string(),
            opened: true,
            error: None,
        }
    }

    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            opened: false,
            error: Some(error.into()),
        }
    }
}

/// Something that can show a URL to the user.
#[async_trait]
pub trait BrowserOpener: Send + Sync {
    /// Never fails: problems are reported in the outcome.
    async fn open(&self, url: &str) -> BrowserOutcome;
}

/// Spawns the platform's URL opener.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowserOpener;

impl SystemBrowserOpener {
    fn command(url: &str) -> Command {
        if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(url);
            cmd
        } else if cfg!(target_os = "windows") {
            // No cmd.exe in between: `&`, `|` and `^` in a URL stay literal.
            let mut cmd = Command::new("rundll32");
            cmd.args(["url.dll,FileProtocolHandler", url]);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(url);
            cmd
        }
    }
}

/// Characters a URL never carries unencoded and that shells or openers treat
/// specially.
const FORBIDDEN_URL_CHARS: &[char] = &['"', '<', '>', '^', '|', '`', '\\'];

fn check_url(url: &str) -> Result<(), &'static str> {
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err("only http(s) URLs can be opened");
    }
    if url
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_URL_CHARS.contains(&c))
    {
        return Err("URL contains characters that must be percent-encoded");
    }
    Ok(())
}

#[async_trait]
impl BrowserOpener for SystemBrowserOpener {
    async fn open(&self, url: &str) -> BrowserOutcome {
        if let Err(reason) = check_url(url) {
            warn!("Refusing to open {:?}: {}", url, reason);
            return BrowserOutcome::failed(url, reason);
        }

        let mut cmd = Self::command(url);
        cmd.stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());

        match cmd.status().await {
            Ok(status) if status.success() => {
                debug!("Opened {} in browser", url);
                BrowserOutcome::opened(url)
            }
            Ok(status) => {
                warn!("Browser opener exited with {} for {}", status, url);
                BrowserOutcome::failed(url, format!("opener exited with {}", status))
            }
            Err(e) => {
                warn!("Failed to spawn browser opener for {}: {}", url, e);
                BrowserOutcome::failed(url, e.to_string())
            }
        }
    }
}
