//! Recording session orchestration.

pub mod machine;
pub mod registry;
pub mod status;

pub use machine::{HealthSnapshot, RecorderMachine, StartOutcome, StartRequest, StopSummary};
pub use registry::SessionRegistry;
pub use status::{CallKey, CallType, SessionInfo, SessionStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("recording capacity exhausted; join the admission queue and wait for your turn")]
    AdmissionFull,

    #[error("queue entry not found (promoted, left, or expired)")]
    QueueEntryNotFound,

    #[error("call {0} has a session in flight ({1})")]
    SessionConflict(String, &'static str),

    #[error("no active recording for call {0}")]
    SessionNotFound(String),

    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("navigation to join page timed out")]
    NavigationTimeout,

    #[error("timed out waiting for the ghost participant to join and start capturing")]
    ReadinessTimeout,

    #[error("in-page recorder did not finish flushing before teardown")]
    StopFlushTimeout,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
