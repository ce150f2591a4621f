//! Real browser implementation: one Chromium process per session.
//!
//! Each launch gets an isolated temporary profile and a fresh DevTools
//! endpoint. Fake media devices are enabled so the ghost participant can
//! join without a physical camera or microphone, and autoplay is
//! unrestricted so capture starts without user interaction.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::broadcast;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use which::which;

use crate::browser::cdp::{self, CdpClient, CdpEvent};
use crate::browser::{BrowserError, BrowserLauncher, GhostPage, StopOutcome};
use crate::config::BrowserConfig;

/// Name of the binding the join page invokes once the ghost participant
/// has joined the call and stream capture is running.
const READY_BINDING: &str = "__wispReady";

/// Budget for individual protocol commands during setup and teardown.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, label: &str) -> Result<Box<dyn GhostPage>, BrowserError> {
        let executable = resolve_executable(&self.config).ok_or_else(|| {
            BrowserError::Launch(
                "no Chromium executable found (set browser.executable or WISP_CHROMIUM)"
                    .to_string(),
            )
        })?;

        let profile = tempfile::Builder::new()
            .prefix("wisp-profile-")
            .tempdir()
            .map_err(BrowserError::Io)?;

        let mut command = Command::new(&executable);
        command
            .args(launch_args(&self.config, profile.path()))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Launching {} for {}", executable.display(), label);
        let mut child = command
            .spawn()
            .map_err(|e| BrowserError::Launch(format!("{}: {e}", executable.display())))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BrowserError::Launch("browser stderr was not captured".to_string()))?;

        let launch_timeout = Duration::from_secs(self.config.launch_timeout_seconds);
        let kill_grace = Duration::from_secs(self.config.kill_grace_seconds);

        match bootstrap(stderr, launch_timeout).await {
            Ok(cdp) => {
                let events = cdp.subscribe();
                info!("Browser ready for {}", label);
                Ok(Box::new(ChromiumPage {
                    label: label.to_string(),
                    child,
                    profile: Some(profile),
                    cdp,
                    events,
                    ready_seen: false,
                    kill_grace,
                }))
            }
            Err(e) => {
                kill_quietly(&mut child, kill_grace).await;
                Err(e)
            }
        }
    }
}

/// Wait for the DevTools endpoint, attach to the initial page target, and
/// enable the domains and readiness binding the session needs.
async fn bootstrap(stderr: ChildStderr, launch_timeout: Duration) -> Result<CdpClient, BrowserError> {
    let browser_ws = timeout(launch_timeout, devtools_endpoint(stderr))
        .await
        .map_err(|_| BrowserError::Timeout {
            ms: launch_timeout.as_millis() as u64,
            condition: "DevTools endpoint announcement".to_string(),
        })?
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    let page_ws = timeout(launch_timeout, discover_page_target(&browser_ws))
        .await
        .map_err(|_| BrowserError::Timeout {
            ms: launch_timeout.as_millis() as u64,
            condition: "page target discovery".to_string(),
        })?
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    let cdp = CdpClient::connect(&page_ws)
        .await
        .map_err(|e| BrowserError::Launch(e.to_string()))?;

    for method in ["Page.enable", "Runtime.enable"] {
        timeout(COMMAND_TIMEOUT, cdp.send(method, json!({})))
            .await
            .map_err(|_| BrowserError::Timeout {
                ms: COMMAND_TIMEOUT.as_millis() as u64,
                condition: method.to_string(),
            })?
            .map_err(|e| BrowserError::Launch(e.to_string()))?;
    }

    timeout(
        COMMAND_TIMEOUT,
        cdp.send("Runtime.addBinding", json!({ "name": READY_BINDING })),
    )
    .await
    .map_err(|_| BrowserError::Timeout {
        ms: COMMAND_TIMEOUT.as_millis() as u64,
        condition: "Runtime.addBinding".to_string(),
    })?
    .map_err(|e| BrowserError::Launch(e.to_string()))?;

    Ok(cdp)
}

/// Scan browser stderr for the `DevTools listening on ws://…` line.
async fn devtools_endpoint(stderr: ChildStderr) -> Result<String> {
    let pattern = Regex::new(r"DevTools listening on (ws://\S+)").expect("valid regex");
    let mut lines = BufReader::new(stderr).lines();
    let mut tail: Vec<String> = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if let Some(captures) = pattern.captures(&line) {
            return Ok(captures[1].to_string());
        }
        if tail.len() >= 10 {
            tail.remove(0);
        }
        tail.push(line);
    }

    bail!(
        "browser exited before announcing its DevTools endpoint; last output: {}",
        tail.join(" | ")
    )
}

/// The stderr line names the browser-level target; sessions drive the
/// page target, found through the DevTools HTTP listing on the same port.
async fn discover_page_target(browser_ws: &str) -> Result<String> {
    let parsed = url::Url::parse(browser_ws).context("Invalid DevTools websocket URL")?;
    let port = parsed
        .port()
        .ok_or_else(|| anyhow!("DevTools websocket URL has no port: {browser_ws}"))?;
    let list_url = format!("http://127.0.0.1:{port}/json/list");

    // The initial about:blank target can take a moment to appear.
    for _ in 0..10 {
        let targets: Vec<Value> = reqwest::get(&list_url)
            .await
            .context("Failed to query DevTools target list")?
            .json()
            .await
            .context("Failed to decode DevTools target list")?;

        for target in &targets {
            if target.get("type").and_then(Value::as_str) == Some("page") {
                if let Some(ws) = target.get("webSocketDebuggerUrl").and_then(Value::as_str) {
                    return Ok(ws.to_string());
                }
            }
        }

        sleep(Duration::from_millis(200)).await;
    }

    bail!("no page target appeared at {list_url}")
}

async fn kill_quietly(child: &mut Child, grace: Duration) {
    if let Err(e) = child.start_kill() {
        debug!("Browser kill failed (likely already gone): {}", e);
    }
    if timeout(grace, child.wait()).await.is_err() {
        warn!("Browser process did not exit after kill");
    }
}

fn launch_args(config: &BrowserConfig, profile: &Path) -> Vec<String> {
    let mut args = vec![
        format!("--user-data-dir={}", profile.display()),
        "--remote-debugging-port=0".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        // The ghost participant has no real devices; grant fake ones and
        // skip the permission prompt so capture starts unattended.
        "--use-fake-ui-for-media-stream".to_string(),
        "--use-fake-device-for-media-stream".to_string(),
        "--autoplay-policy=no-user-gesture-required".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    args.push("about:blank".to_string());
    args
}

fn resolve_executable(config: &BrowserConfig) -> Option<PathBuf> {
    if let Some(configured) = &config.executable {
        let trimmed = configured.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
            warn!("Configured browser executable {:?} does not exist", candidate);
        }
    }

    if let Ok(raw) = env::var("WISP_CHROMIUM") {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            let candidate = PathBuf::from(trimmed);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    for name in executable_names() {
        if let Ok(path) = which(name) {
            return Some(path);
        }
    }

    for candidate in os_specific_paths() {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}

fn executable_names() -> &'static [&'static str] {
    &[
        "chromium",
        "chromium-browser",
        "google-chrome-stable",
        "google-chrome",
    ]
}

fn os_specific_paths() -> Vec<PathBuf> {
    #[cfg(target_os = "macos")]
    {
        vec![
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
        ]
    }

    #[cfg(not(target_os = "macos"))]
    {
        vec![
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/google-chrome"),
        ]
    }
}

struct ChromiumPage {
    label: String,
    child: Child,
    profile: Option<TempDir>,
    cdp: CdpClient,
    events: broadcast::Receiver<CdpEvent>,
    ready_seen: bool,
    kill_grace: Duration,
}

#[async_trait]
impl GhostPage for ChromiumPage {
    async fn navigate(&mut self, url: &str, deadline: Duration) -> Result<(), BrowserError> {
        let result = timeout(deadline, self.cdp.send("Page.navigate", json!({ "url": url })))
            .await
            .map_err(|_| BrowserError::Timeout {
                ms: deadline.as_millis() as u64,
                condition: format!("navigation to {url}"),
            })?
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                source: e,
            })?;

        if let Some(error_text) = result.get("errorText").and_then(Value::as_str) {
            if !error_text.is_empty() {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    source: anyhow!("{error_text}"),
                });
            }
        }

        // The readiness binding can fire while we still wait for the load
        // event; remember it so wait_ready does not miss the signal.
        let mut ready_seen = self.ready_seen;
        let loaded = cdp::wait_for_event(&mut self.events, |event| {
            if is_ready_signal(event) {
                ready_seen = true;
            }
            event.method == "Page.loadEventFired"
        });

        let waited = timeout(deadline, loaded).await;
        self.ready_seen = ready_seen;

        match waited {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(BrowserError::Navigation {
                url: url.to_string(),
                source: e,
            }),
            Err(_) => Err(BrowserError::Timeout {
                ms: deadline.as_millis() as u64,
                condition: format!("load event for {url}"),
            }),
        }
    }

    async fn wait_ready(&mut self, deadline: Duration) -> Result<(), BrowserError> {
        if self.ready_seen {
            return Ok(());
        }

        let ready = cdp::wait_for_event(&mut self.events, is_ready_signal);
        match timeout(deadline, ready).await {
            Ok(Ok(_)) => {
                self.ready_seen = true;
                Ok(())
            }
            Ok(Err(e)) => Err(BrowserError::Other(e)),
            Err(_) => Err(BrowserError::Timeout {
                ms: deadline.as_millis() as u64,
                condition: "ghost participant readiness signal".to_string(),
            }),
        }
    }

    async fn stop_and_flush(&mut self, deadline: Duration) -> Result<StopOutcome, BrowserError> {
        let expression = "(async () => { \
             if (window.__wisp && window.__wisp.stopAndFlush) { \
                 return await window.__wisp.stopAndFlush(); \
             } \
             return null; \
         })()";

        let result = timeout(
            deadline,
            self.cdp.send(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                }),
            ),
        )
        .await
        .map_err(|_| BrowserError::Timeout {
            ms: deadline.as_millis() as u64,
            condition: "stop-and-flush".to_string(),
        })?
        .map_err(|e| BrowserError::JsEval(e.to_string()))?;

        if let Some(exception) = result.get("exceptionDetails") {
            return Err(BrowserError::JsEval(exception.to_string()));
        }

        let value = result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null);

        if value.is_null() {
            return Ok(StopOutcome::default());
        }

        serde_json::from_value(value).map_err(|e| BrowserError::JsEval(e.to_string()))
    }

    async fn close(&mut self) {
        // Give the page a chance to release tracks and sockets first.
        let cleanup = self.cdp.send(
            "Runtime.evaluate",
            json!({
                "expression": "window.__wisp && window.__wisp.cleanup && window.__wisp.cleanup()",
                "returnByValue": true,
            }),
        );
        if timeout(CLEANUP_TIMEOUT, cleanup).await.is_err() {
            debug!("Page cleanup timed out for {}", self.label);
        }

        let close = self.cdp.send("Page.close", json!({}));
        let _ = timeout(COMMAND_TIMEOUT, close).await;
        self.cdp.close().await;

        match timeout(self.kill_grace, self.child.wait()).await {
            Ok(Ok(status)) => debug!("Browser for {} exited: {}", self.label, status),
            _ => {
                warn!(
                    "Browser for {} did not exit cleanly, killing process",
                    self.label
                );
                kill_quietly(&mut self.child, self.kill_grace).await;
            }
        }

        if let Some(profile) = self.profile.take() {
            if let Err(e) = profile.close() {
                warn!("Failed to remove browser profile: {}", e);
            }
        }
    }
}

fn is_ready_signal(event: &CdpEvent) -> bool {
    event.method == "Runtime.bindingCalled"
        && event.params.get("name").and_then(Value::as_str) == Some(READY_BINDING)
}
