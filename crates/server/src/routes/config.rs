// crates/server/src/routes/config.rs
//! Configuration endpoints.

use std::sync::Arc;

use axum::{
    extract::{rejection::StringRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use backup_controller_core::Config;
use backup_controller_types::{ActionResponse, ResponseStatus};

use super::body_text;
use crate::error::{ApiError, ApiResult, OperationError};
use crate::lifecycle::LifecycleEvent;
use crate::state::AppState;

fn yaml_response(yaml: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=UTF-8"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        yaml,
    )
        .into_response()
}

/// GET /backup/config/default
pub async fn default_config() -> ApiResult<Response> {
    Ok(yaml_response(Config::default().to_yaml()?))
}

/// GET /backup/config - Active configuration with secrets masked.
pub async fn current_config(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    Ok(yaml_response(state.config.current().redacted().to_yaml()?))
}

/// POST /backup/config - Publish a new configuration and restart the listener.
///
/// The body is merged over the defaults and validated first. Publishing is
/// refused with 423 while an operation is in progress, and the ledger stays
/// locked until the new configuration is in place.
pub async fn update_config(
    State(state): State<Arc<AppState>>,
    body: Result<String, StringRejection>,
) -> Result<Response, OperationError> {
    let body = body_text(body).map_err(|e| e.for_operation("update"))?;
    let config = Config::from_yaml(&body).map_err(|e| ApiError::from(e).for_operation("update"))?;
    config
        .validate()
        .map_err(|e| ApiError::from(e).for_operation("update"))?;

    state
        .ledger
        .while_idle(|| state.config.replace(config))
        .map_err(|c| ApiError::from(c).for_operation("update"))?;
    tracing::info!("Applying new valid config");

    if state.events.send(LifecycleEvent::Restart).await.is_err() {
        return Err(ApiError::Internal("lifecycle loop is not running".to_string()).for_operation("update"));
    }
    Ok((
        StatusCode::OK,
        Json(ActionResponse::new(ResponseStatus::Success, "update")),
    )
        .into_response())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/backup/config/default", get(default_config))
        .route("/backup/config", get(current_config).post(update_config))
}
