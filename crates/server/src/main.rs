// crates/server/src/main.rs
//! Backup controller binary.
//!
//! Loads the configuration, installs logging, then hands control to the
//! lifecycle loop, which serves the API until SIGTERM or SIGINT.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use backup_controller_core::{CliEngine, Config};
use backup_controller_server::lifecycle::{self, LifecycleManager};
use backup_controller_server::AppState;
use clap::Parser;

/// HTTP control plane for clickhouse-backup.
#[derive(Debug, Parser)]
#[command(name = "backup-controller", version, about)]
struct Args {
    /// Configuration file. Defaults are used when it does not exist.
    #[arg(
        short,
        long,
        env = "BACKUP_CONTROLLER_CONFIG",
        default_value = "/etc/clickhouse-backup/config.yml"
    )]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_exists = args.config.exists();
    let config = if config_exists {
        Config::load(&args.config).with_context(|| format!("loading {}", args.config.display()))?
    } else {
        let config = Config::default();
        config.validate()?;
        config
    };

    let log_handle = backup_controller_observability::init_tracing(&config.log)?;
    if config_exists {
        tracing::info!(path = %args.config.display(), "configuration loaded");
    } else {
        tracing::warn!(path = %args.config.display(), "configuration file not found, using defaults");
    }

    // TLS acceptors pass their provider explicitly; this covers clients.
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        listen_addr = %config.api.listen_addr,
        remote_storage = %config.general.remote_storage,
        "starting backup controller"
    );

    let (events_tx, events_rx) = lifecycle::channel();
    let state = AppState::new(config, Arc::new(CliEngine::new()), events_tx.clone());

    let config = state.config.current();
    if config.api.enable_metrics {
        state.dispatcher.refresh_backup_sizes(&config).await;
    }

    let _signals = lifecycle::spawn_signal_forwarder(events_tx)?;

    LifecycleManager::new(state, events_rx, Some(args.config))
        .with_log_handle(log_handle)
        .run()
        .await
}
