//! Shared test fixtures: an in-memory browser launcher so session
//! orchestration can be exercised without real browser processes.

// Each integration test crate compiles its own view of this module and
// uses a different subset of it.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use wisp::browser::{BrowserError, BrowserLauncher, GhostPage, StopOutcome};
use wisp::config::{Config, RecordingConfig};

/// How a fake session should misbehave, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    None,
    Launch,
    Navigation,
    Readiness,
}

#[derive(Clone, Default)]
pub struct LaunchCounters {
    launched: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl LaunchCounters {
    pub fn launched(&self) -> usize {
        self.launched.load(Ordering::SeqCst)
    }

    /// Browser processes currently alive. Must be zero after teardown.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

pub struct FakeLauncher {
    pub counters: LaunchCounters,
    pub mode: FailureMode,
}

impl FakeLauncher {
    pub fn new(mode: FailureMode) -> Self {
        Self {
            counters: LaunchCounters::default(),
            mode,
        }
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self, _label: &str) -> Result<Box<dyn GhostPage>, BrowserError> {
        if self.mode == FailureMode::Launch {
            return Err(BrowserError::Launch("no browser installed".to_string()));
        }

        self.counters.launched.fetch_add(1, Ordering::SeqCst);
        self.counters.live.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(FakePage {
            counters: self.counters.clone(),
            mode: self.mode,
            open: true,
        }))
    }
}

struct FakePage {
    counters: LaunchCounters,
    mode: FailureMode,
    open: bool,
}

#[async_trait]
impl GhostPage for FakePage {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        if self.mode == FailureMode::Navigation {
            return Err(BrowserError::Timeout {
                ms: timeout.as_millis() as u64,
                condition: format!("load event for {url}"),
            });
        }
        Ok(())
    }

    async fn wait_ready(&mut self, timeout: Duration) -> Result<(), BrowserError> {
        if self.mode == FailureMode::Readiness {
            return Err(BrowserError::Timeout {
                ms: timeout.as_millis() as u64,
                condition: "ghost participant readiness signal".to_string(),
            });
        }
        Ok(())
    }

    async fn stop_and_flush(&mut self, _timeout: Duration) -> Result<StopOutcome, BrowserError> {
        Ok(StopOutcome {
            recording_id: Some("rec-1".to_string()),
            file_url: Some("https://storage.example.com/rec-1.mp4".to_string()),
        })
    }

    async fn close(&mut self) {
        if self.open {
            self.open = false;
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
            self.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Service config for tests: bounded capacity, short queue TTL, and no
/// database writes.
pub fn test_config(capacity: usize) -> Config {
    let mut config = Config::default();
    config.recording = RecordingConfig {
        capacity,
        persist_history: false,
        ..RecordingConfig::default()
    };
    config.queue.ttl_seconds = 60;
    config
}
