// crates/server/src/listener.rs
//! One bound listener serving the router, plain or TLS.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use backup_controller_core::config::ApiConfig;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::TcpListener;
use tokio::task::{JoinHandle, JoinSet};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;

use crate::tls;

/// A listener with its serving task.
///
/// [`RunningServer::close`] stops accepting, lets in-flight requests drain for
/// the configured grace period and then aborts whatever is left.
#[derive(Debug)]
pub struct RunningServer {
    listen_addr: String,
    local_addr: SocketAddr,
    secure: bool,
    grace: Duration,
    token: CancellationToken,
    task: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub async fn bind(api: &ApiConfig, router: Router) -> anyhow::Result<Self> {
        // Load TLS material before taking the port.
        let acceptor = if api.secure {
            Some(tls::create_tls_acceptor(api)?)
        } else {
            None
        };

        let listener = TcpListener::bind(api.listen_addr.as_str())
            .await
            .with_context(|| format!("failed to bind {}", api.listen_addr))?;
        let local_addr = listener.local_addr()?;
        let token = CancellationToken::new();

        let task = match acceptor {
            Some(acceptor) => tokio::spawn(serve_tls(listener, acceptor, router, token.clone())),
            None => {
                let shutdown = token.clone().cancelled_owned();
                tokio::spawn(async move {
                    axum::serve(listener, router)
                        .with_graceful_shutdown(shutdown)
                        .await
                })
            }
        };

        tracing::info!(
            listen_addr = %api.listen_addr,
            %local_addr,
            secure = api.secure,
            "API server listening"
        );
        Ok(Self {
            listen_addr: api.listen_addr.clone(),
            local_addr,
            secure: api.secure,
            grace: Duration::from_secs(api.shutdown_grace_secs),
            token,
            task,
        })
    }

    /// Address as configured, e.g. `localhost:7171`.
    pub fn listen_addr(&self) -> &str {
        &self.listen_addr
    }

    /// Address actually bound; differs from the configured one for port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Stop accepting and drain. Returns the serving task's error, if any.
    pub async fn close(self) -> anyhow::Result<()> {
        self.token.cancel();
        let mut task = self.task;
        match tokio::time::timeout(self.grace, &mut task).await {
            Ok(Ok(result)) => {
                tracing::info!(local_addr = %self.local_addr, "API server closed");
                result.context("API server failed")
            }
            Ok(Err(join)) => Err(anyhow::anyhow!("API server task failed: {join}")),
            Err(_) => {
                task.abort();
                tracing::warn!(
                    local_addr = %self.local_addr,
                    grace_secs = self.grace.as_secs(),
                    "API server did not drain in time, aborted"
                );
                Ok(())
            }
        }
    }
}

async fn serve_tls(
    listener: TcpListener,
    acceptor: TlsAcceptor,
    router: Router,
    token: CancellationToken,
) -> std::io::Result<()> {
    let mut connections = JoinSet::new();
    loop {
        let (stream, peer_addr) = tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        let acceptor = acceptor.clone();
        let service = TowerToHyperService::new(router.clone());
        let token = token.clone();
        connections.spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!(%peer_addr, error = %e, "TLS handshake failed");
                    return;
                }
            };
            let builder = auto::Builder::new(TokioExecutor::new());
            let conn = builder.serve_connection(TokioIo::new(tls_stream), service);
            tokio::pin!(conn);
            let result = tokio::select! {
                res = conn.as_mut() => res,
                _ = token.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.await
                }
            };
            if let Err(e) = result {
                tracing::debug!(%peer_addr, error = %e, "error serving connection");
            }
        });

        // Reap finished connections so the set does not grow without bound.
        while connections.try_join_next().is_some() {}
    }

    drop(listener);
    while connections.join_next().await.is_some() {}
    Ok(())
}
