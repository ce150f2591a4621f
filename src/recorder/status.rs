//! Session status types shared between the machine and API handlers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of call a ghost participant can join. The two kinds use different
/// join pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown call type: {other}")),
        }
    }
}

/// Lifecycle of one recording session. `Stopped` is terminal; a stopped
/// session is removed from the registry in the same step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Starting,
    Recording,
    Stopping,
    Stopped,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// Identifies one call across both the registry and the admission queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallKey {
    pub call_type: CallType,
    pub call_id: String,
}

impl CallKey {
    pub fn new(call_type: CallType, call_id: impl Into<String>) -> Self {
        Self {
            call_type,
            call_id: call_id.into(),
        }
    }
}

impl fmt::Display for CallKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.call_type, self.call_id)
    }
}

/// Read-only snapshot of a session, served by status/list endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: Uuid,
    pub call_id: String,
    pub call_type: CallType,
    pub group_id: String,
    pub status: SessionStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub duration_seconds: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_type_round_trip() {
        assert_eq!(CallType::Audio.as_str(), "audio");
        assert_eq!("video".parse::<CallType>().unwrap(), CallType::Video);
        assert!("screen".parse::<CallType>().is_err());
    }

    #[test]
    fn test_call_type_serialization() {
        let json = serde_json::to_string(&CallType::Video).unwrap();
        assert_eq!(json, "\"video\"");

        let parsed: CallType = serde_json::from_str("\"audio\"").unwrap();
        assert_eq!(parsed, CallType::Audio);
    }

    #[test]
    fn test_session_status_as_str() {
        assert_eq!(SessionStatus::Starting.as_str(), "starting");
        assert_eq!(SessionStatus::Recording.as_str(), "recording");
        assert_eq!(SessionStatus::Stopping.as_str(), "stopping");
        assert_eq!(SessionStatus::Stopped.as_str(), "stopped");
    }

    #[test]
    fn test_call_key_display() {
        let key = CallKey::new(CallType::Audio, "call-9");
        assert_eq!(key.to_string(), "audio/call-9");
    }
}
