// crates/server/src/jobs/dispatcher.rs
//! Admits operations through the ledger and runs them against the engine.

use std::sync::Arc;
use std::time::Instant;

use backup_controller_core::{BackupEngine, Config, Conflict, JobLedger, Operation, SharedConfig};
use backup_controller_types::{Location, OperationRecord, OperationStatus};
use chrono::Local;
use tokio::sync::oneshot;

use super::handle::JobHandle;
use crate::metrics::MetricsRecorder;

/// Result of a successful dispatch.
#[derive(Debug)]
pub enum Dispatched {
    /// Detached operation accepted and running on its own task.
    Acknowledged(JobHandle),
    /// Synchronous operation finished; the record may carry an error.
    Completed(OperationRecord),
}

/// Single-flight gate in front of the backup engine.
///
/// Every admitted operation runs on its own task, so a dropped request can
/// never leave a ledger record in progress forever. Detached operations are
/// acknowledged right away; synchronous ones (`delete`) are awaited.
#[derive(Clone)]
pub struct Dispatcher {
    ledger: Arc<JobLedger>,
    metrics: Arc<MetricsRecorder>,
    engine: Arc<dyn BackupEngine>,
    config: SharedConfig,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<JobLedger>,
        metrics: Arc<MetricsRecorder>,
        engine: Arc<dyn BackupEngine>,
        config: SharedConfig,
    ) -> Self {
        Self {
            ledger,
            metrics,
            engine,
            config,
        }
    }

    /// Admit and start `operation`, recording it under `command`.
    ///
    /// Fails with [`Conflict`] and no side effects while another operation
    /// is in progress.
    pub fn submit(&self, operation: Operation, command: impl Into<String>) -> Result<JobHandle, Conflict> {
        let ticket = self.ledger.try_begin(command)?;
        let started = Instant::now();
        let class = operation.class();
        let config = self.config.current();
        self.metrics.record_start(class, Local::now());
        tracing::info!(command = %ticket.command(), "operation started");

        let (done_tx, done_rx) = oneshot::channel();
        let handle = JobHandle::new(ticket.id(), ticket.command(), done_rx);

        let this = self.clone();
        tokio::spawn(async move {
            let command = ticket.command().to_string();

            // The engine call gets its own task so a panic surfaces as a
            // JoinError instead of skipping the ledger update.
            let engine = Arc::clone(&this.engine);
            let engine_config = Arc::clone(&config);
            let run = tokio::spawn(async move { engine.execute(&engine_config, &operation).await });
            let error = match run.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => Some(format!("operation aborted: {e}")),
            };

            let record = this.ledger.finish(ticket, error.clone());
            this.metrics.record_finish(class, started, error.is_none());
            match &error {
                None => tracing::info!(
                    %command,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "operation finished"
                ),
                Some(e) => tracing::error!(
                    %command,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    error = %e,
                    "operation failed"
                ),
            }

            if config.api.enable_metrics {
                this.refresh_backup_sizes(&config).await;
            }
            // Receiver is gone when the caller dropped the handle.
            let _ = done_tx.send(record);
        });

        Ok(handle)
    }

    /// Submit and, for synchronous classes, wait for the outcome.
    pub async fn dispatch(&self, operation: Operation, command: impl Into<String>) -> Result<Dispatched, Conflict> {
        let detached = operation.class().is_detached();
        let handle = self.submit(operation, command)?;
        if detached {
            return Ok(Dispatched::Acknowledged(handle));
        }
        let command = handle.command().to_string();
        match handle.wait().await {
            Some(record) => Ok(Dispatched::Completed(record)),
            None => {
                tracing::warn!(%command, "finished record no longer in ledger");
                Ok(Dispatched::Completed(OperationRecord {
                    id: 0,
                    command,
                    status: OperationStatus::Error,
                    start: Local::now(),
                    finish: Some(Local::now()),
                    error: Some("operation outcome lost".to_string()),
                }))
            }
        }
    }

    /// Update the last local/remote backup size gauges from the engine's
    /// listings. Remote is skipped when no remote storage is configured.
    /// Failures are logged and leave the gauges untouched.
    pub async fn refresh_backup_sizes(&self, config: &Config) {
        match self.engine.local_backups(config).await {
            Ok(backups) => self.metrics.set_last_backup_size(
                Location::Local,
                backups.last().map_or(0, |b| b.size),
            ),
            Err(e) => tracing::warn!(error = %e, "failed to list local backups for size metrics"),
        }

        if !config.general.has_remote_storage() {
            return;
        }
        match self.engine.remote_backups(config).await {
            Ok(backups) => self.metrics.set_last_backup_size(
                Location::Remote,
                backups.last().map_or(0, |b| b.size),
            ),
            Err(e) => tracing::warn!(error = %e, "failed to list remote backups for size metrics"),
        }
    }

    pub fn ledger(&self) -> &Arc<JobLedger> {
        &self.ledger
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("engine", &self.engine.name())
            .field("in_progress", &self.ledger.is_in_progress())
            .finish_non_exhaustive()
    }
}
