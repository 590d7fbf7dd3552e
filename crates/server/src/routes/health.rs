// crates/server/src/routes/health.rs
//! Liveness check. Mounted outside the authentication layer, so it needs no
//! credentials.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    /// An operation holds the ledger.
    pub busy: bool,
}

/// GET /health - 200 while the listener is up, busy or not.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.uptime_secs(),
        busy: state.ledger.is_in_progress(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use backup_controller_core::{Config, Operation};
    use tower::ServiceExt;

    use crate::testing::FakeEngine;

    async fn health_json(state: Arc<AppState>) -> serde_json::Value {
        let response = router()
            .with_state(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_reports_busy_ledger() {
        let engine = Arc::new(FakeEngine::gated());
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let state = AppState::new(Config::default(), engine.clone(), tx);

        let idle = health_json(Arc::clone(&state)).await;
        assert_eq!(idle["status"], "OK");
        assert_eq!(idle["busy"], false);

        let op = Operation::Create {
            name: "nightly".into(),
            table: None,
            schema_only: false,
        };
        let handle = state.dispatcher.submit(op, "create nightly").unwrap();
        assert_eq!(health_json(Arc::clone(&state)).await["busy"], true);

        engine.release(1);
        handle.wait().await;
        assert_eq!(health_json(state).await["busy"], false);
    }
}
