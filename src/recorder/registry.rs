//! Authoritative map of active recording sessions.
//!
//! One entry per call, at most `capacity` entries alive. The capacity
//! counter is a semaphore whose permits live inside the entries, so slot
//! accounting can never drift from the map contents. All mutation happens
//! under one lock: check-and-insert, status transitions, and removal are
//! atomic with respect to each other.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use uuid::Uuid;

use crate::browser::GhostPage;
use crate::recorder::status::{CallKey, SessionInfo, SessionStatus};

struct SessionEntry {
    session_id: Uuid,
    group_id: String,
    status: SessionStatus,
    started_at: DateTime<Utc>,
    /// Attached once the session reaches `recording`; taken exactly once
    /// by the stop path.
    page: Option<Box<dyn GhostPage>>,
    /// The capacity slot this session occupies.
    permit: Option<OwnedSemaphorePermit>,
}

/// Outcome of the atomic check-and-insert performed at session start.
pub enum InsertOutcome {
    Inserted,
    /// Another session already owns this call.
    AlreadyActive {
        session_id: Uuid,
        status: SessionStatus,
    },
    /// The registry no longer accepts sessions (shutdown in progress).
    Closed,
}

/// What the stop path pulled out of the registry.
pub struct StoppingSession {
    pub session_id: Uuid,
    pub group_id: String,
    pub started_at: DateTime<Utc>,
    pub page: Option<Box<dyn GhostPage>>,
}

pub enum BeginStopOutcome {
    Stopping(StoppingSession),
    NotFound,
    /// The session exists but is not in a stoppable state.
    Conflict(SessionStatus),
}

pub struct SessionRegistry {
    capacity: usize,
    slots: Arc<Semaphore>,
    closed: AtomicBool,
    sessions: Mutex<HashMap<CallKey, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Arc::new(Semaphore::new(capacity)),
            closed: AtomicBool::new(false),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The capacity pool, shared with the admission queue.
    pub fn slots(&self) -> Arc<Semaphore> {
        Arc::clone(&self.slots)
    }

    /// Grab a free slot without waiting.
    pub fn try_acquire_slot(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.slots).try_acquire_owned().ok()
    }

    /// Atomically register a provisional `starting` session, closing the
    /// race window against a concurrent start for the same call. On any
    /// outcome but `Inserted` the caller keeps the permit.
    pub fn insert_starting(
        &self,
        call: &CallKey,
        session_id: Uuid,
        group_id: &str,
        permit: OwnedSemaphorePermit,
    ) -> (InsertOutcome, Option<OwnedSemaphorePermit>) {
        if self.closed.load(Ordering::SeqCst) {
            return (InsertOutcome::Closed, Some(permit));
        }

        let mut sessions = self.sessions.lock().expect("registry lock poisoned");
        if let Some(existing) = sessions.get(call) {
            return (
                InsertOutcome::AlreadyActive {
                    session_id: existing.session_id,
                    status: existing.status,
                },
                Some(permit),
            );
        }

        sessions.insert(
            call.clone(),
            SessionEntry {
                session_id,
                group_id: group_id.to_string(),
                status: SessionStatus::Starting,
                started_at: Utc::now(),
                page: None,
                permit: Some(permit),
            },
        );
        (InsertOutcome::Inserted, None)
    }

    /// Transition a provisional session to `recording`, attaching its
    /// page handle. Fails when the entry vanished underneath the start
    /// (shutdown raced it); the caller then owns the teardown.
    pub fn attach_page(&self, call: &CallKey, page: Box<dyn GhostPage>) -> Result<(), Box<dyn GhostPage>> {
        let mut sessions = self.sessions.lock().expect("registry lock poisoned");
        match sessions.get_mut(call) {
            Some(entry) if entry.status == SessionStatus::Starting => {
                entry.status = SessionStatus::Recording;
                entry.page = Some(page);
                Ok(())
            }
            _ => Err(page),
        }
    }

    /// Transition `recording → stopping` and take the page handle. The
    /// loser of a stop/stop race observes `Conflict(Stopping)`; a stop
    /// racing an unfinished start observes `Conflict(Starting)`.
    pub fn begin_stop(&self, call: &CallKey) -> BeginStopOutcome {
        let mut sessions = self.sessions.lock().expect("registry lock poisoned");
        let Some(entry) = sessions.get_mut(call) else {
            return BeginStopOutcome::NotFound;
        };

        if entry.status != SessionStatus::Recording {
            return BeginStopOutcome::Conflict(entry.status);
        }

        entry.status = SessionStatus::Stopping;
        BeginStopOutcome::Stopping(StoppingSession {
            session_id: entry.session_id,
            group_id: entry.group_id.clone(),
            started_at: entry.started_at,
            page: entry.page.take(),
        })
    }

    /// Remove an entry (the `stopped` transition), yielding its capacity
    /// slot so the caller can hand it to the admission queue.
    pub fn remove(&self, call: &CallKey) -> Option<OwnedSemaphorePermit> {
        let mut sessions = self.sessions.lock().expect("registry lock poisoned");
        let mut entry = sessions.remove(call)?;
        entry.permit.take()
    }

    pub fn get_info(&self, call: &CallKey) -> Option<SessionInfo> {
        let sessions = self.sessions.lock().expect("registry lock poisoned");
        sessions.get(call).map(|entry| info_for(call, entry))
    }

    pub fn list(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.lock().expect("registry lock poisoned");
        let mut infos: Vec<SessionInfo> = sessions
            .iter()
            .map(|(call, entry)| info_for(call, entry))
            .collect();
        infos.sort_by_key(|info| info.started_at);
        infos
    }

    pub fn active_calls(&self) -> Vec<CallKey> {
        let sessions = self.sessions.lock().expect("registry lock poisoned");
        sessions.keys().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.sessions.lock().expect("registry lock poisoned").len()
    }

    /// Refuse new sessions from now on. Existing sessions still stop
    /// normally.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn info_for(call: &CallKey, entry: &SessionEntry) -> SessionInfo {
    let elapsed = Utc::now() - entry.started_at;
    SessionInfo {
        session_id: entry.session_id,
        call_id: call.call_id.clone(),
        call_type: call.call_type,
        group_id: entry.group_id.clone(),
        status: entry.status,
        started_at: entry.started_at,
        duration_seconds: elapsed.num_seconds().max(0) as u64,
    }
}
