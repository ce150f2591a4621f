//! Browser process control for ghost participants.
//!
//! The machine drives sessions through the `BrowserLauncher`/`GhostPage`
//! traits so tests can inject a fake browser. The real implementation
//! launches one isolated Chromium process per session and speaks the
//! DevTools protocol to it.

pub mod cdp;
pub mod chromium;
pub mod urls;

pub use chromium::ChromiumLauncher;

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("navigation failed: {url}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("timeout after {ms}ms waiting for: {condition}")]
    Timeout { ms: u64, condition: String },

    #[error("javascript evaluation failed: {0}")]
    JsEval(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// What the in-page recorder reports after its upload flush completes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopOutcome {
    pub recording_id: Option<String>,
    pub file_url: Option<String>,
}

/// Launches one isolated browser process per recording session.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a fresh browser and return its sole page. `label` is only
    /// used to tag logs and the temporary profile.
    async fn launch(&self, label: &str) -> Result<Box<dyn GhostPage>, BrowserError>;
}

/// Control handle for the single page a ghost participant lives in.
///
/// Every operation is bounded by the caller-supplied timeout; none may
/// block indefinitely on an unresponsive browser.
#[async_trait]
pub trait GhostPage: Send {
    /// Navigate to the join page and wait for the load event.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError>;

    /// Wait for the page to signal that the ghost participant has joined
    /// the call and begun capturing streams.
    async fn wait_ready(&mut self, timeout: Duration) -> Result<(), BrowserError>;

    /// Tell the in-page recorder to stop capturing and flush its upload,
    /// returning whatever artifact identifiers it reports.
    async fn stop_and_flush(&mut self, timeout: Duration) -> Result<StopOutcome, BrowserError>;

    /// Tear down the page and its browser process. Best-effort: failures
    /// are logged by the implementation, never surfaced to the caller.
    async fn close(&mut self);
}
