//! Session lifecycle orchestrator.
//!
//! Drives the full recording pipeline per call:
//! admit → launch → navigate → ready → recording → stop-flush → teardown
//!
//! The browser is injected via the `BrowserLauncher` trait — no concrete
//! browser hardcoded. Every suspension point is bounded; a failed start
//! leaves zero trace in the registry and zero orphaned processes.

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::browser::{urls, BrowserError, BrowserLauncher, GhostPage, StopOutcome};
use crate::config::{BrowserConfig, Config, RecordingConfig};
use crate::db::{self, NewRecording, RecordingRepository};
use crate::queue::AdmissionQueue;
use crate::recorder::registry::{BeginStopOutcome, InsertOutcome, SessionRegistry};
use crate::recorder::status::{CallKey, CallType, SessionInfo, SessionStatus};
use crate::recorder::RecorderError;

/// Parameters of one start request, as received over the control API.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub group_id: String,
    pub call_id: String,
    pub call_type: CallType,
    pub auth_token: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub enum StartOutcome {
    Started { session_id: Uuid },
    /// The call already has a live recording; joining it is idempotent.
    AlreadyRecording { session_id: Uuid },
}

impl StartOutcome {
    pub fn session_id(&self) -> Uuid {
        match self {
            Self::Started { session_id } | Self::AlreadyRecording { session_id } => *session_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StopSummary {
    pub session_id: Uuid,
    pub duration_seconds: u64,
    pub recording_id: Option<String>,
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub active_recordings: usize,
    pub capacity: usize,
    pub queue_depth: usize,
}

#[derive(Clone)]
pub struct RecorderMachine {
    launcher: Arc<dyn BrowserLauncher>,
    registry: Arc<SessionRegistry>,
    queue: Arc<AdmissionQueue>,
    recording: RecordingConfig,
    browser: BrowserConfig,
}

impl RecorderMachine {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        registry: Arc<SessionRegistry>,
        queue: Arc<AdmissionQueue>,
        config: &Config,
    ) -> Self {
        Self {
            launcher,
            registry,
            queue,
            recording: config.recording.clone(),
            browser: config.browser.clone(),
        }
    }

    /// Start a recording session. Runs in its own task so a disconnecting
    /// HTTP client cannot cancel a half-finished launch.
    pub async fn start_recording(&self, request: StartRequest) -> Result<StartOutcome, RecorderError> {
        let machine = self.clone();
        tokio::spawn(async move { machine.start_inner(request).await })
            .await
            .map_err(|e| RecorderError::Other(anyhow!("start task failed: {e}")))?
    }

    /// Stop a recording session and free its capacity slot. Detached from
    /// the caller for the same reason as `start_recording`: teardown must
    /// finish even if the client goes away.
    pub async fn stop_recording(&self, call: CallKey) -> Result<StopSummary, RecorderError> {
        let machine = self.clone();
        tokio::spawn(async move { machine.stop_inner(call).await })
            .await
            .map_err(|e| RecorderError::Other(anyhow!("stop task failed: {e}")))?
    }

    pub fn status(&self, call: &CallKey) -> Option<SessionInfo> {
        self.registry.get_info(call)
    }

    pub fn list_active(&self) -> Vec<SessionInfo> {
        self.registry.list()
    }

    pub async fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            active_recordings: self.registry.active_count(),
            capacity: self.registry.capacity(),
            queue_depth: self.queue.depth().await,
        }
    }

    /// Stop every active session concurrently, each bounded by the
    /// configured shutdown timeout. New starts are refused from the first
    /// moment of shutdown.
    pub async fn shutdown(&self) {
        self.registry.close();

        let calls = self.registry.active_calls();
        if calls.is_empty() {
            info!("Shutdown: no active recording sessions");
            return;
        }

        info!("Shutdown: stopping {} active recording session(s)", calls.len());
        let mut tasks = JoinSet::new();
        for call in calls {
            let machine = self.clone();
            let budget = self.recording.shutdown_timeout();
            tasks.spawn(async move {
                match timeout(budget, machine.stop_inner(call.clone())).await {
                    Ok(Ok(summary)) => {
                        info!("Shutdown: stopped {} after {}s", call, summary.duration_seconds);
                    }
                    Ok(Err(e)) => warn!("Shutdown: failed to stop {}: {}", call, e),
                    Err(_) => warn!("Shutdown: timed out stopping {}", call),
                }
            });
        }
        while tasks.join_next().await.is_some() {}
        info!("Shutdown: all recording sessions stopped");
    }

    async fn start_inner(&self, request: StartRequest) -> Result<StartOutcome, RecorderError> {
        let call = CallKey::new(request.call_type, request.call_id.clone());

        // Fast path for idempotent joins; authoritative check happens at
        // insert below.
        if let Some(info) = self.registry.get_info(&call) {
            return Self::already_active(&call, info.session_id, info.status);
        }

        // A reservation promoted from the queue wins over the open pool,
        // so a promoted waiter can never be beaten to its own slot.
        let permit = match self.queue.claim(&call).await {
            Some(permit) => permit,
            None => self
                .registry
                .try_acquire_slot()
                .ok_or(RecorderError::AdmissionFull)?,
        };

        let session_id = Uuid::new_v4();
        let (outcome, returned) =
            self.registry
                .insert_starting(&call, session_id, &request.group_id, permit);

        match outcome {
            InsertOutcome::Inserted => {}
            InsertOutcome::AlreadyActive { session_id, status } => {
                // The slot we grabbed is genuinely free; pass it on.
                if let Some(permit) = returned {
                    self.queue.hand_off(permit).await;
                }
                return Self::already_active(&call, session_id, status);
            }
            InsertOutcome::Closed => {
                drop(returned);
                return Err(RecorderError::Other(anyhow!("service is shutting down")));
            }
        }

        info!(
            "Session {} starting for {} (group {})",
            session_id, call, request.group_id
        );

        match self.drive_start(&call, &request).await {
            Ok(page) => match self.registry.attach_page(&call, page) {
                Ok(()) => {
                    info!("Session {} recording for {}", session_id, call);
                    Ok(StartOutcome::Started { session_id })
                }
                Err(mut page) => {
                    // Shutdown raced the start; tear straight back down.
                    warn!("Session {} for {} superseded before readiness", session_id, call);
                    page.close().await;
                    self.release(&call).await;
                    Err(RecorderError::Other(anyhow!("service is shutting down")))
                }
            },
            Err(e) => {
                error!("Session {} for {} failed to start: {}", session_id, call, e);
                self.release(&call).await;
                Err(e)
            }
        }
    }

    /// Launch, navigate, and wait for readiness. The page is torn down
    /// here on any failure so callers only ever see it fully joined.
    async fn drive_start(
        &self,
        call: &CallKey,
        request: &StartRequest,
    ) -> Result<Box<dyn GhostPage>, RecorderError> {
        let mut page = self
            .launcher
            .launch(&call.to_string())
            .await
            .map_err(|e| RecorderError::BrowserLaunch(e.to_string()))?;

        let api_url = urls::rewrite_loopback(&request.api_url, &self.browser.host_gateway);
        let base = match call.call_type {
            CallType::Audio => &self.browser.audio_join_url,
            CallType::Video => &self.browser.video_join_url,
        };
        let join_url = match urls::build_join_url(
            base,
            &request.group_id,
            &call.call_id,
            call.call_type,
            &request.auth_token,
            &api_url,
        ) {
            Ok(join_url) => join_url,
            Err(e) => {
                page.close().await;
                return Err(RecorderError::Other(anyhow!(
                    "invalid join page URL {base}: {e}"
                )));
            }
        };

        debug!("Navigating ghost for {} to its join page", call);
        if let Err(e) = page.navigate(&join_url, self.recording.page_load_timeout()).await {
            page.close().await;
            return Err(match e {
                BrowserError::Timeout { .. } => RecorderError::NavigationTimeout,
                other => RecorderError::Other(
                    anyhow::Error::new(other).context("navigation to join page failed"),
                ),
            });
        }

        if let Err(e) = page.wait_ready(self.recording.ready_timeout()).await {
            page.close().await;
            return Err(match e {
                BrowserError::Timeout { .. } => RecorderError::ReadinessTimeout,
                other => RecorderError::Other(
                    anyhow::Error::new(other).context("waiting for ghost readiness failed"),
                ),
            });
        }

        Ok(page)
    }

    async fn stop_inner(&self, call: CallKey) -> Result<StopSummary, RecorderError> {
        let mut taken = match self.registry.begin_stop(&call) {
            BeginStopOutcome::Stopping(taken) => taken,
            BeginStopOutcome::NotFound => {
                return Err(RecorderError::SessionNotFound(call.to_string()))
            }
            BeginStopOutcome::Conflict(status) => {
                return Err(RecorderError::SessionConflict(
                    call.to_string(),
                    status.as_str(),
                ))
            }
        };

        info!("Session {} stopping for {}", taken.session_id, call);

        let mut outcome = StopOutcome::default();
        match taken.page {
            Some(ref mut page) => {
                // Stopping the browser before the flush completes loses
                // the recording; give the page its grace period first.
                match page.stop_and_flush(self.recording.stop_flush_timeout()).await {
                    Ok(reported) => outcome = reported,
                    Err(BrowserError::Timeout { .. }) => {
                        warn!("{} for {}, tearing down anyway", RecorderError::StopFlushTimeout, call)
                    }
                    Err(e) => {
                        warn!("Stop-and-flush for {} failed, tearing down anyway: {}", call, e)
                    }
                }
                page.close().await;
            }
            None => warn!(
                "Session {} for {} had no page attached at stop",
                taken.session_id, call
            ),
        }

        let duration_seconds = (Utc::now() - taken.started_at).num_seconds().max(0) as u64;
        self.release(&call).await;
        info!(
            "Session {} stopped for {} after {}s",
            taken.session_id, call, duration_seconds
        );

        if self.recording.persist_history {
            self.persist(
                &call,
                taken.session_id,
                &taken.group_id,
                taken.started_at,
                &outcome,
                duration_seconds,
            )
            .await;
        }

        Ok(StopSummary {
            session_id: taken.session_id,
            duration_seconds,
            recording_id: outcome.recording_id,
            file_url: outcome.file_url,
        })
    }

    /// Remove the registry entry and hand its capacity slot to the next
    /// waiter. This is the promotion trigger.
    async fn release(&self, call: &CallKey) {
        if let Some(permit) = self.registry.remove(call) {
            self.queue.hand_off(permit).await;
        }
    }

    fn already_active(
        call: &CallKey,
        session_id: Uuid,
        status: SessionStatus,
    ) -> Result<StartOutcome, RecorderError> {
        match status {
            SessionStatus::Recording => Ok(StartOutcome::AlreadyRecording { session_id }),
            status => Err(RecorderError::SessionConflict(
                call.to_string(),
                status.as_str(),
            )),
        }
    }

    async fn persist(
        &self,
        call: &CallKey,
        session_id: Uuid,
        group_id: &str,
        started_at: DateTime<Utc>,
        outcome: &StopOutcome,
        duration_seconds: u64,
    ) {
        let row = NewRecording {
            session_id: session_id.to_string(),
            recording_id: outcome.recording_id.clone(),
            call_id: call.call_id.clone(),
            call_type: call.call_type.as_str().to_string(),
            group_id: group_id.to_string(),
            file_url: outcome.file_url.clone(),
            duration_seconds: duration_seconds as i64,
            started_at: started_at.to_rfc3339(),
        };

        let persisted = tokio::task::spawn_blocking(move || {
            let conn = db::init_db()?;
            RecordingRepository::insert(&conn, &row)
        })
        .await;

        match persisted {
            Ok(Ok(id)) => debug!("Recording record {} persisted for {}", id, call),
            Ok(Err(e)) => warn!("Failed to persist recording record for {}: {}", call, e),
            Err(e) => warn!("Recording persistence task failed for {}: {}", call, e),
        }
    }
}
