//! Admission queue endpoints.
//!
//! Provides HTTP endpoints for:
//! - Joining the queue (POST /recording-queue/join)
//! - Polling for a turn (GET /recording-queue/check-turn/:queue_id)
//! - Leaving the queue (POST /recording-queue/leave)

use crate::api::error::{ApiError, ApiResult};
use crate::queue::{AdmissionQueue, JoinRequest};
use crate::recorder::{CallType, RecorderError};
use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinBody {
    pub group_id: String,
    pub call_id: String,
    pub call_type: CallType,
    #[serde(default)]
    pub requester_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveBody {
    pub queue_id: String,
}

pub fn router(queue: Arc<AdmissionQueue>) -> Router {
    Router::new()
        .route("/join", post(join_queue))
        .route("/check-turn/:queue_id", get(check_turn))
        .route("/leave", post(leave_queue))
        .with_state(queue)
}

/// Join the admission queue. Always succeeds; when capacity is free the
/// very first check-turn poll already answers "your turn".
async fn join_queue(
    State(queue): State<Arc<AdmissionQueue>>,
    Json(body): Json<JoinBody>,
) -> Json<Value> {
    info!(
        "Queue join requested for {}/{} (group {})",
        body.call_type, body.call_id, body.group_id
    );

    let receipt = queue
        .join(JoinRequest {
            call_type: body.call_type,
            call_id: body.call_id,
            group_id: body.group_id,
            requester_id: body.requester_id,
        })
        .await;

    Json(json!({
        "queueId": receipt.queue_id,
        "position": receipt.position,
        "totalInQueue": receipt.total_in_queue,
    }))
}

/// Poll a queue entry. A 404 means the entry was promoted and claimed,
/// left, or expired — the client should leave and rejoin.
async fn check_turn(
    Path(queue_id): Path<String>,
    State(queue): State<Arc<AdmissionQueue>>,
) -> ApiResult<Json<Value>> {
    let queue_id: Uuid = queue_id
        .parse()
        .map_err(|_| ApiError::from(RecorderError::QueueEntryNotFound))?;

    match queue.check_turn(queue_id).await {
        Some(turn) => Ok(Json(json!({
            "isYourTurn": turn.is_your_turn,
            "position": turn.position,
            "totalInQueue": turn.total_in_queue,
        }))),
        None => Err(RecorderError::QueueEntryNotFound.into()),
    }
}

/// Leave the queue. Idempotent: removing an unknown entry is not an
/// error, so clients can call this speculatively during cleanup.
async fn leave_queue(
    State(queue): State<Arc<AdmissionQueue>>,
    Json(body): Json<LeaveBody>,
) -> Json<Value> {
    let removed = match body.queue_id.parse::<Uuid>() {
        Ok(queue_id) => queue.leave(queue_id).await,
        Err(_) => false,
    };

    Json(json!({ "success": true, "removed": removed }))
}
