// crates/server/src/lib.rs
//! Backup controller server library.
//!
//! Axum HTTP API in front of the backup engine: per-verb endpoints, the batch
//! action endpoint, the job ledger views, configuration management and
//! Prometheus metrics. [`lifecycle::LifecycleManager`] owns the listener and
//! rebuilds it on restart, reload and shutdown.

pub mod auth;
pub mod error;
pub mod jobs;
pub mod lifecycle;
pub mod listener;
pub mod metrics;
pub mod routes;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tls;

pub use error::*;
pub use lifecycle::{LifecycleEvent, LifecycleManager};
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;

/// Create the Axum application with all routes and middleware.
///
/// Called again on every restart so route selection follows the current
/// configuration. The state, and with it the ledger and metrics, is shared
/// across every router built from it.
pub fn build_app(state: Arc<AppState>) -> Router {
    api_routes(state).layer(backup_controller_observability::http_trace_layer())
}

// ============================================================================
// Integration Tests
// ============================================================================
