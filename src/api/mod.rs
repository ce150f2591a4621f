//! REST control surface for wisp.
//!
//! Provides HTTP endpoints for:
//! - Recording control (start, stop, status, list)
//! - Admission queue (join, check-turn, leave)
//! - Service health and completed-recording history
//! - Application logs

pub mod error;
pub mod routes;

use crate::config::Config;
use crate::queue::AdmissionQueue;
use crate::recorder::{CallType, RecorderMachine};
use anyhow::Result;
use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use tower::ServiceBuilder;
use tracing::info;

pub struct ApiServer {
    bind: String,
    port: u16,
    machine: RecorderMachine,
    queue: Arc<AdmissionQueue>,
}

impl ApiServer {
    pub fn new(machine: RecorderMachine, queue: Arc<AdmissionQueue>, config: &Config) -> Self {
        Self {
            bind: config.server.bind.clone(),
            port: config.server.port,
            machine,
            queue,
        }
    }

    pub async fn start(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let app = Router::new()
            // Root and version endpoints
            .route("/", get(service_info))
            .route("/version", get(version))
            .route("/health", get(health).with_state(self.machine.clone()))
            // Recording control endpoints
            .nest("/recording", routes::recording::router(self.machine.clone()))
            // Admission queue endpoints
            .nest("/recording-queue", routes::queue::router(self.queue.clone()))
            // Other API routes
            .nest("/logs", routes::logs::router())
            .layer(ServiceBuilder::new());

        let listener =
            tokio::net::TcpListener::bind(&format!("{}:{}", self.bind, self.port)).await?;

        info!("API server listening on http://{}:{}", self.bind, self.port);
        info!("Endpoints:");
        info!("  GET  /                                   - Service info");
        info!("  GET  /version                            - Version info");
        info!("  GET  /health                             - Health and capacity");
        info!("  POST /recording/start                    - Start a recording");
        info!("  POST /recording/stop                     - Stop a recording");
        info!("  GET  /recording/status/:type/:id         - Per-call status");
        info!("  GET  /recording/list                     - Active sessions");
        info!("  GET  /recording/history                  - Completed recordings");
        info!("  POST /recording-queue/join               - Join the admission queue");
        info!("  GET  /recording-queue/check-turn/:id     - Poll for your turn");
        info!("  POST /recording-queue/leave              - Leave the queue");
        info!("  GET  /logs                               - Application logs");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

async fn service_info() -> Json<Value> {
    Json(json!({
        "service": "wisp",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn version() -> Json<Value> {
    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "name": "wisp"
    }))
}

async fn health(State(machine): State<RecorderMachine>) -> Json<Value> {
    let snapshot = machine.health().await;
    Json(json!({
        "status": "ok",
        "activeRecordings": snapshot.active_recordings,
        "capacity": snapshot.capacity,
        "queueDepth": snapshot.queue_depth,
        "capabilities": {
            "callTypes": [CallType::Audio.as_str(), CallType::Video.as_str()],
        },
    }))
}
