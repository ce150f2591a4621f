use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub recording: RecordingConfig,
    pub queue: QueueConfig,
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the control API binds to. Keep loopback unless the service
    /// sits behind its own ingress.
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Maximum number of simultaneous recording sessions.
    pub capacity: usize,
    /// Seconds to wait for the join page to finish loading.
    pub page_load_timeout_seconds: u64,
    /// Seconds to wait for the ghost participant to report it joined the
    /// call and began capturing streams.
    pub ready_timeout_seconds: u64,
    /// Grace period for the in-page recorder to flush its upload before
    /// the browser is torn down.
    pub stop_flush_timeout_seconds: u64,
    /// Per-session budget when stopping everything at process shutdown.
    pub shutdown_timeout_seconds: u64,
    /// Persist completed recordings to the local database.
    pub persist_history: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// An entry whose client has not polled check-turn within this window
    /// is treated as abandoned and purged.
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Explicit Chromium executable path. Auto-detected when empty.
    pub executable: Option<String>,
    pub headless: bool,
    /// Join page for audio calls. The machine appends group/call/token
    /// query parameters.
    pub audio_join_url: String,
    /// Join page for video calls.
    pub video_join_url: String,
    /// Host substituted for loopback hostnames in the API URL handed to
    /// the page. The browser may run in a different network namespace
    /// than the backend it must reach.
    pub host_gateway: String,
    /// Seconds to wait for the DevTools endpoint after process spawn.
    pub launch_timeout_seconds: u64,
    /// Seconds a closed browser process gets to exit before SIGKILL.
    pub kill_grace_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3443,
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            capacity: 2,
            page_load_timeout_seconds: 30,
            ready_timeout_seconds: 45,
            stop_flush_timeout_seconds: 20,
            shutdown_timeout_seconds: 30,
            persist_history: true,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { ttl_seconds: 45 }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            audio_join_url: "http://127.0.0.1:8080/ghost/audio-call".to_string(),
            video_join_url: "http://127.0.0.1:8080/ghost/video-call".to_string(),
            host_gateway: "host.docker.internal".to_string(),
            launch_timeout_seconds: 20,
            kill_grace_seconds: 5,
        }
    }
}

impl RecordingConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_seconds)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_seconds)
    }

    pub fn stop_flush_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_flush_timeout_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

impl QueueConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
