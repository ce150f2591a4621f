//! Application log endpoints.

use crate::api::error::{ApiError, ApiResult};
use crate::logs::{get_logs, LogsOptions};
use axum::{extract::Query, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::collections::HashMap;

pub fn router() -> Router {
    Router::new().route("/", get(fetch_logs))
}

/// Get recent application logs and completed recordings.
async fn fetch_logs(Query(params): Query<HashMap<String, String>>) -> ApiResult<Json<Value>> {
    let lines: usize = params
        .get("lines")
        .and_then(|v| v.parse().ok())
        .unwrap_or(100);

    let result = tokio::task::spawn_blocking(move || get_logs(&LogsOptions::new(lines)))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .map_err(ApiError::from)?;

    Ok(Json(json!(result)))
}
