//! Recording control endpoints.
//!
//! Provides HTTP endpoints for:
//! - Starting a recording session (POST /recording/start)
//! - Stopping a recording session (POST /recording/stop)
//! - Per-call status (GET /recording/status/:call_type/:call_id)
//! - Active session snapshot (GET /recording/list)
//! - Completed recording history (GET /recording/history)

use crate::api::error::{ApiError, ApiResult};
use crate::db::{self, RecordingRepository};
use crate::recorder::{CallKey, CallType, RecorderMachine, StartOutcome, StartRequest};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::info;

/// Request body for the start endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
    pub group_id: String,
    pub call_id: String,
    pub call_type: CallType,
    pub auth_token: String,
    pub api_url: String,
}

/// Request body for the stop endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopBody {
    pub call_id: String,
    pub call_type: CallType,
}

pub fn router(machine: RecorderMachine) -> Router {
    Router::new()
        .route("/start", post(start_recording))
        .route("/stop", post(stop_recording))
        .route("/status/:call_type/:call_id", get(recording_status))
        .route("/list", get(list_recordings))
        .route("/history", get(recording_history))
        .with_state(machine)
}

/// Starts a ghost-participant recording for one call.
///
/// Joining a call that is already being recorded is not an error: the
/// response carries the existing session's identity instead.
async fn start_recording(
    State(machine): State<RecorderMachine>,
    Json(body): Json<StartBody>,
) -> ApiResult<Json<Value>> {
    info!(
        "Start recording requested for {}/{} (group {})",
        body.call_type, body.call_id, body.group_id
    );

    let outcome = machine
        .start_recording(StartRequest {
            group_id: body.group_id,
            call_id: body.call_id,
            call_type: body.call_type,
            auth_token: body.auth_token,
            api_url: body.api_url,
        })
        .await?;

    let already = matches!(outcome, StartOutcome::AlreadyRecording { .. });
    Ok(Json(json!({
        "sessionId": outcome.session_id(),
        "isRecording": true,
        "alreadyRecording": already,
    })))
}

/// Stops a recording and reports what the in-page recorder uploaded.
async fn stop_recording(
    State(machine): State<RecorderMachine>,
    Json(body): Json<StopBody>,
) -> ApiResult<Json<Value>> {
    info!(
        "Stop recording requested for {}/{}",
        body.call_type, body.call_id
    );

    let summary = machine
        .stop_recording(CallKey::new(body.call_type, body.call_id))
        .await?;

    Ok(Json(json!({
        "sessionId": summary.session_id,
        "recordingId": summary.recording_id,
        "fileUrl": summary.file_url,
        "duration": summary.duration_seconds,
    })))
}

/// Per-call status. Never errors: an unknown call (or an unknown call
/// type) simply reports that nothing is recording.
async fn recording_status(
    Path((call_type, call_id)): Path<(String, String)>,
    State(machine): State<RecorderMachine>,
) -> Json<Value> {
    let Ok(call_type) = call_type.parse::<CallType>() else {
        return Json(json!({ "isRecording": false }));
    };

    match machine.status(&CallKey::new(call_type, call_id)) {
        Some(info) => Json(json!({
            "isRecording": info.status == crate::recorder::SessionStatus::Recording,
            "status": info.status.as_str(),
            "sessionId": info.session_id,
            "startedAt": info.started_at,
            "duration": info.duration_seconds,
        })),
        None => Json(json!({ "isRecording": false })),
    }
}

/// Snapshot of every active session, for operational visibility.
async fn list_recordings(State(machine): State<RecorderMachine>) -> Json<Value> {
    let recordings = machine.list_active();
    Json(json!({
        "count": recordings.len(),
        "recordings": recordings,
    }))
}

/// Recent completed recordings from the local database.
async fn recording_history(
    Query(params): Query<HashMap<String, String>>,
    State(_machine): State<RecorderMachine>,
) -> ApiResult<Json<Value>> {
    let limit: usize = params
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);

    let records = tokio::task::spawn_blocking(move || {
        let conn = db::init_db()?;
        RecordingRepository::list(&conn, limit)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))?
    .map_err(ApiError::from)?;

    Ok(Json(json!({
        "count": records.len(),
        "recordings": records,
    })))
}
