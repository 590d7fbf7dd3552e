//! Prometheus metrics endpoint.
//!
//! Exposes the recorder's registry in Prometheus text format at `GET /metrics`.
//! Only mounted when `api.enable_metrics` is set.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use crate::state::AppState;

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.render(),
    )
        .into_response()
}

/// Create the metrics routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/metrics", get(metrics_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use backup_controller_core::{CommandClass, Config};
    use std::time::Instant;
    use tower::ServiceExt;

    use crate::testing::FakeEngine;

    #[tokio::test]
    async fn test_metrics_endpoint_renders_recorder() {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let state = AppState::new(Config::default(), Arc::new(FakeEngine::new()), tx);
        state.metrics.record_finish(CommandClass::Create, Instant::now(), true);

        let app = router().with_state(state);
        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get(header::CONTENT_TYPE).unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("clickhouse_backup_successful_creates 1"));
    }
}
