use crate::api::ApiServer;
use crate::browser::{BrowserLauncher, ChromiumLauncher};
use crate::config::Config;
use crate::queue::AdmissionQueue;
use crate::recorder::{RecorderMachine, SessionRegistry};
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

pub async fn run_service() -> Result<()> {
    info!("Starting wisp service");

    let config = Config::load()?;

    if config.recording.persist_history {
        // Run migrations up front so the first stop does not pay for them.
        if let Err(e) = crate::db::init_db() {
            warn!("Recording history database unavailable: {e:#}");
        }
    }

    let registry = Arc::new(SessionRegistry::new(config.recording.capacity));
    let queue = Arc::new(AdmissionQueue::new(registry.slots(), config.queue.ttl()));
    let launcher: Arc<dyn BrowserLauncher> =
        Arc::new(ChromiumLauncher::new(config.browser.clone()));
    let machine = RecorderMachine::new(launcher, Arc::clone(&registry), Arc::clone(&queue), &config);

    info!(
        "Recording capacity: {} concurrent session(s), queue TTL {}s",
        config.recording.capacity, config.queue.ttl_seconds
    );

    let api_server = ApiServer::new(machine.clone(), Arc::clone(&queue), &config);

    info!("wisp is ready!");
    info!(
        "Test manually: curl http://{}:{}/health",
        config.server.bind, config.server.port
    );

    // The server drains on SIGINT/SIGTERM; every live session is stopped
    // before the process may exit.
    api_server.start(shutdown_signal()).await?;

    machine.shutdown().await;
    info!("wisp stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Termination signal received, shutting down");
}
