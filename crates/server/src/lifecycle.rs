// crates/server/src/lifecycle.rs
//! Server lifecycle: the process's top-level event loop.
//!
//! Restart requests from the API, reloads on SIGHUP and shutdown on
//! SIGTERM/SIGINT all arrive on one channel and are handled strictly one at a
//! time. The ledger and metrics live in [`AppState`] and survive every
//! restart; only the listener and router are rebuilt.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use backup_controller_core::Config;
use backup_controller_observability::LogHandle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::listener::RunningServer;
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Rebuild the listener from the current configuration.
    Restart,
    /// Re-read the configuration file, publish it, then restart.
    Reload,
    /// Close the listener and leave the loop.
    Shutdown,
}

/// Channel shared by the signal forwarder and the API.
pub fn channel() -> (mpsc::Sender<LifecycleEvent>, mpsc::Receiver<LifecycleEvent>) {
    mpsc::channel(16)
}

/// Translate process signals into lifecycle events.
#[cfg(unix)]
pub fn spawn_signal_forwarder(events: mpsc::Sender<LifecycleEvent>) -> anyhow::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup()).context("install SIGHUP handler")?;
    let mut terminate = signal(SignalKind::terminate()).context("install SIGTERM handler")?;
    let mut interrupt = signal(SignalKind::interrupt()).context("install SIGINT handler")?;

    Ok(tokio::spawn(async move {
        loop {
            let (event, name) = tokio::select! {
                _ = hangup.recv() => (LifecycleEvent::Reload, "SIGHUP"),
                _ = terminate.recv() => (LifecycleEvent::Shutdown, "SIGTERM"),
                _ = interrupt.recv() => (LifecycleEvent::Shutdown, "SIGINT"),
            };
            tracing::info!(signal = name, ?event, "signal received");
            if events.send(event).await.is_err() {
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_signal_forwarder(events: mpsc::Sender<LifecycleEvent>) -> anyhow::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received");
            if events.send(LifecycleEvent::Shutdown).await.is_err() {
                break;
            }
        }
    }))
}

/// Owns the listening server and consumes [`LifecycleEvent`]s.
pub struct LifecycleManager {
    state: Arc<AppState>,
    events: mpsc::Receiver<LifecycleEvent>,
    config_path: Option<PathBuf>,
    log: Option<LogHandle>,
    /// Running listener and the configuration it was bound with.
    server: Option<(RunningServer, Arc<Config>)>,
    addr_tx: watch::Sender<Option<SocketAddr>>,
}

impl LifecycleManager {
    pub fn new(
        state: Arc<AppState>,
        events: mpsc::Receiver<LifecycleEvent>,
        config_path: Option<PathBuf>,
    ) -> Self {
        let (addr_tx, _) = watch::channel(None);
        Self {
            state,
            events,
            config_path,
            log: None,
            server: None,
            addr_tx,
        }
    }

    /// Apply `log.level` changes on reload through this handle.
    pub fn with_log_handle(mut self, log: LogHandle) -> Self {
        self.log = Some(log);
        self
    }

    /// Follows the bound address: `Some` while serving, `None` when stopped.
    pub fn subscribe_addr(&self) -> watch::Receiver<Option<SocketAddr>> {
        self.addr_tx.subscribe()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(|(s, _)| s.local_addr())
    }

    fn publish_addr(&self) {
        self.addr_tx.send_replace(self.local_addr());
    }

    async fn bind(&self, config: &Arc<Config>) -> anyhow::Result<RunningServer> {
        let router = crate::build_app(Arc::clone(&self.state));
        RunningServer::bind(&config.api, router).await
    }

    /// Bind a listener from the current configuration, replacing any running
    /// one.
    ///
    /// An unchanged address is closed before binding; a new address is bound
    /// first. If binding fails the previous configuration is published again
    /// and, when the old listener was already closed, rebound.
    pub async fn restart(&mut self) -> anyhow::Result<()> {
        let config = self.state.config.current();
        let result = match self.server.take() {
            None => match self.bind(&config).await {
                Ok(server) => {
                    self.server = Some((server, config));
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Some((old, old_config)) if old.listen_addr() == config.api.listen_addr => {
                if let Err(e) = old.close().await {
                    tracing::warn!(error = %e, "previous listener closed with error");
                }
                match self.bind(&config).await {
                    Ok(server) => {
                        self.server = Some((server, config));
                        Ok(())
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "bind failed, restoring previous listener");
                        self.state.config.replace((*old_config).clone());
                        match self.bind(&old_config).await {
                            Ok(server) => self.server = Some((server, old_config)),
                            Err(rebind) => {
                                tracing::error!(error = %rebind, "rebinding previous listener failed");
                            }
                        }
                        Err(e)
                    }
                }
            }
            Some((old, old_config)) => match self.bind(&config).await {
                Ok(server) => {
                    if let Err(e) = old.close().await {
                        tracing::warn!(error = %e, "previous listener closed with error");
                    }
                    self.server = Some((server, config));
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(error = %e, "bind failed, keeping previous listener");
                    self.state.config.replace((*old_config).clone());
                    self.server = Some((old, old_config));
                    Err(e)
                }
            },
        };
        self.publish_addr();
        result
    }

    /// Re-read the configuration file and restart. A file that fails to load
    /// or validate leaves configuration and listener untouched. `log.level`
    /// is applied only once the new listener is serving.
    pub async fn reload(&mut self) -> anyhow::Result<()> {
        let Some(path) = self.config_path.clone() else {
            anyhow::bail!("no configuration file to reload");
        };
        let config = Config::load(&path)
            .with_context(|| format!("reload of {} failed, keeping current configuration", path.display()))?;
        let log_config = config.log.clone();

        self.state.config.replace(config);
        tracing::info!(path = %path.display(), "configuration reloaded");
        self.restart().await?;

        if let Some(log) = &self.log {
            if let Err(e) = log.apply(&log_config) {
                tracing::warn!(error = %e, "log settings not applied");
            }
        }
        Ok(())
    }

    /// Close the listener, if any.
    pub async fn shutdown(&mut self) -> anyhow::Result<()> {
        let result = match self.server.take() {
            Some((server, _)) => server.close().await,
            None => Ok(()),
        };
        self.publish_addr();
        result
    }

    /// Start serving and handle events until `Shutdown`.
    ///
    /// Events are handled sequentially; a failed restart or reload is logged
    /// and the loop carries on. The listener's close error on shutdown is the
    /// return value.
    pub async fn run(mut self) -> anyhow::Result<()> {
        self.restart().await?;
        while let Some(event) = self.events.recv().await {
            tracing::debug!(?event, "lifecycle event");
            match event {
                LifecycleEvent::Restart => {
                    if let Err(e) = self.restart().await {
                        tracing::error!(error = %format!("{e:#}"), "restart failed");
                    }
                }
                LifecycleEvent::Reload => {
                    if let Err(e) = self.reload().await {
                        tracing::error!(error = %format!("{e:#}"), "reload failed");
                    }
                }
                LifecycleEvent::Shutdown => break,
            }
        }
        tracing::info!("shutting down");
        self.shutdown().await
    }
}

impl std::fmt::Debug for LifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("config_path", &self.config_path)
            .field("local_addr", &self.local_addr())
            .finish_non_exhaustive()
    }
}
