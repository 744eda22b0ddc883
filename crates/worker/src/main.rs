//! TrackRelay worker
//!
//! Loads configuration, installs logging, wires the store and partner client,
//! then runs the relay worker until SIGINT or SIGTERM.

mod context;

use std::sync::Arc;

use anyhow::Context as _;
use tracing::{error, info, warn};
use trackrelay_infra::{config, init_logging, RelayWorker, RelayWorkerConfig};

use crate::context::WorkerContext;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    let config = config::load().context("loading configuration")?;
    let _logging = init_logging(&config.logging).context("initializing logging")?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "Loaded .env"),
        Err(e) => info!(error = %e, "No .env file loaded"),
    }

    let ctx = WorkerContext::new(config)?;
    info!(
        partner = %ctx.config.partner.base_url,
        client_id = ctx.config.partner.client_id,
        database = %ctx.config.database.name,
        store_timezone = %ctx.config.database.timezone,
        poll_interval_ms = ctx.config.sync.poll_interval_ms,
        page_size = ctx.config.sync.page_size,
        report_timezone = %ctx.config.sync.report_timezone,
        "TrackRelay starting"
    );

    if let Err(e) = ctx.pool.ping().await {
        warn!(error = %e, "Database not reachable at startup; cycles will retry");
    }

    let mut worker =
        RelayWorker::new(Arc::clone(&ctx.service), RelayWorkerConfig::from(&ctx.config.sync));
    worker.start().await.map_err(anyhow::Error::msg).context("starting relay worker")?;

    shutdown_signal().await;

    if let Err(e) = worker.stop().await {
        warn!(error = %e, "Relay worker did not stop cleanly");
    }
    ctx.pool.close();
    info!("TrackRelay stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Error setting up signal handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Error setting up SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received shutdown signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }
}
