// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use backup_controller_core::{BackupEngine, Config, JobLedger, SharedConfig};
use tokio::sync::mpsc;

use crate::jobs::Dispatcher;
use crate::lifecycle::LifecycleEvent;
use crate::metrics::MetricsRecorder;

/// Shared application state accessible from all route handlers.
///
/// Survives server restarts: the lifecycle manager rebuilds the router and
/// listener around the same state, so the ledger and metrics outlive every
/// listener.
pub struct AppState {
    /// Process start time for uptime tracking.
    pub start_time: Instant,
    /// Active configuration, swapped wholesale on reload.
    pub config: SharedConfig,
    pub ledger: Arc<JobLedger>,
    pub metrics: Arc<MetricsRecorder>,
    pub engine: Arc<dyn BackupEngine>,
    pub dispatcher: Dispatcher,
    /// Lifecycle loop input; `POST /backup/config` sends `Restart` here.
    pub events: mpsc::Sender<LifecycleEvent>,
}

impl AppState {
    pub fn new(
        config: Config,
        engine: Arc<dyn BackupEngine>,
        events: mpsc::Sender<LifecycleEvent>,
    ) -> Arc<Self> {
        let ledger = Arc::new(JobLedger::with_max_records(config.api.max_actions_history));
        let metrics = Arc::new(MetricsRecorder::new());
        let config = SharedConfig::new(config);
        let dispatcher = Dispatcher::new(
            Arc::clone(&ledger),
            Arc::clone(&metrics),
            Arc::clone(&engine),
            config.clone(),
        );
        Arc::new(Self {
            start_time: Instant::now(),
            config,
            ledger,
            metrics,
            engine,
            dispatcher,
            events,
        })
    }

    /// Get server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("uptime_secs", &self.uptime_secs())
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
