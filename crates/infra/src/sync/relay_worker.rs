//! Polling worker that drives sync cycles.
//!
//! The first cycle runs as soon as the worker starts. Each cycle is awaited
//! to completion before the worker sleeps for the poll interval, so the
//! effective period is the interval plus the cycle duration. Cancellation is
//! observed only while sleeping; a running cycle always finishes.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use trackrelay_core::SyncService;
//! use trackrelay_infra::sync::{RelayWorker, RelayWorkerConfig};
//!
//! # async fn example(service: Arc<SyncService>) -> Result<(), String> {
//! let mut worker = RelayWorker::new(
//!     service,
//!     RelayWorkerConfig { poll_interval: Duration::from_secs(60), ..Default::default() },
//! );
//!
//! worker.start().await?;
//! // ... application runs ...
//! worker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use trackrelay_core::SyncService;
use trackrelay_domain::constants::DEFAULT_POLL_INTERVAL_MS;
use trackrelay_domain::SyncConfig;

/// Configuration for the relay worker.
#[derive(Debug, Clone)]
pub struct RelayWorkerConfig {
    /// Sleep between the end of one cycle and the start of the next
    pub poll_interval: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
}

impl Default for RelayWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            join_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&SyncConfig> for RelayWorkerConfig {
    fn from(sync: &SyncConfig) -> Self {
        Self { poll_interval: sync.poll_interval(), ..Self::default() }
    }
}

/// Relay worker with explicit lifecycle management.
pub struct RelayWorker {
    service: Arc<SyncService>,
    config: RelayWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl RelayWorker {
    /// Idle worker; nothing runs until [`RelayWorker::start`].
    pub fn new(service: Arc<SyncService>, config: RelayWorkerConfig) -> Self {
        Self { service, config, cancellation: CancellationToken::new(), task_handle: None }
    }

    /// Start the worker, spawning the background polling task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), String> {
        if self.is_running() {
            return Err("Worker already running".to_string());
        }

        info!(poll_interval_ms = self.config.poll_interval.as_millis(), "Starting relay worker");

        self.cancellation = CancellationToken::new();
        let service = Arc::clone(&self.service);
        let poll_interval = self.config.poll_interval;
        let cancel = self.cancellation.clone();

        self.task_handle = Some(tokio::spawn(run(service, poll_interval, cancel)));
        Ok(())
    }

    /// Stop the worker and wait for the in-flight cycle to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), String> {
        if !self.is_running() {
            return Err("Worker not running".to_string());
        }

        info!("Stopping relay worker");
        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            match tokio::time::timeout(self.config.join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Worker task panicked: {}", e);
                    return Err("Worker task panicked".to_string());
                }
                Err(_) => {
                    warn!("Worker task did not complete within timeout");
                    return Err("Worker task timeout".to_string());
                }
            }
        }

        info!("Relay worker stopped");
        self.cancellation = CancellationToken::new();
        Ok(())
    }

    /// Returns true when a worker instance is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }
}

impl Drop for RelayWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("RelayWorker dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}

/// Run cycles until `cancel` fires.
///
/// Cycle failures are logged and the next cycle is still scheduled.
pub async fn run(service: Arc<SyncService>, poll_interval: Duration, cancel: CancellationToken) {
    loop {
        match service.run_cycle().await {
            Ok(report) => debug!(?report, "Cycle complete"),
            Err(err) => error!(error = %err, "Sync cycle failed"),
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Relay worker loop cancelled");
                break;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }
}
