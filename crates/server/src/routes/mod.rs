//! API route handlers for the backup controller.

pub mod actions;
pub mod backup;
pub mod config;
pub mod health;
pub mod index;
pub mod metrics;

use std::sync::Arc;

use axum::{
    extract::{rejection::StringRejection, FromRequestParts, Query},
    http::{header, request::Parts, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    Router,
};
use backup_controller_types::to_json_each_row;
use serde::{de::DeserializeOwned, Serialize};

use crate::auth;
use crate::error::ApiError;
use crate::state::AppState;

pub(crate) const JSON_EACH_ROW: &str = "application/json; charset=UTF-8";

/// Create the combined API router.
///
/// Routes:
/// - GET  / - Route index
/// - GET  /backup/tables - Tables known to the engine
/// - GET  /backup/list - Local and remote backups
/// - POST /backup/create - Create a backup (detached)
/// - POST /backup/upload/{name} - Upload to remote storage (detached)
/// - POST /backup/download/{name} - Download from remote storage (detached)
/// - POST /backup/restore/{name} - Restore a local backup (detached)
/// - POST /backup/delete/{where}/{name} - Delete a backup
/// - GET  /backup/config/default - Default configuration
/// - GET  /backup/config - Active configuration, secrets redacted
/// - POST /backup/config - Replace the configuration and restart
/// - GET  /backup/status - Ledger snapshot
/// - GET  /backup/actions - Ledger snapshot
/// - POST /backup/actions - Batch command submission
/// - GET  /metrics - Prometheus metrics, when `api.enable_metrics`
/// - GET  /health - Health check, no authentication
///
/// The set of routes is fixed when the router is built, so toggling
/// `api.enable_metrics` takes effect on the next restart.
pub fn api_routes(state: Arc<AppState>) -> Router {
    let enable_metrics = state.config.current().api.enable_metrics;

    let mut protected = Router::new()
        .merge(index::router())
        .merge(backup::router())
        .merge(config::router())
        .merge(actions::router());
    if enable_metrics {
        protected = protected.merge(metrics::router());
    }
    let protected = protected.layer(middleware::from_fn_with_state(
        Arc::clone(&state),
        auth::require_credentials,
    ));

    Router::new()
        .merge(protected)
        .merge(health::router())
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("404 Not Found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

/// Query parameters where a repeated key keeps its first value.
///
/// Rejections surface as [`ApiError::Validation`]; handlers take
/// `Result<FirstQuery<T>, ApiError>` to tag them with their verb.
#[derive(Debug)]
pub struct FirstQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for FirstQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|e| ApiError::Validation(e.body_text()))?;
        first_values(pairs).map(FirstQuery)
    }
}

fn first_values<T: DeserializeOwned>(pairs: Vec<(String, String)>) -> Result<T, ApiError> {
    let mut map = serde_json::Map::new();
    for (key, value) in pairs {
        map.entry(key).or_insert(serde_json::Value::String(value));
    }
    serde_json::from_value(serde_json::Value::Object(map))
        .map_err(|e| ApiError::Validation(format!("invalid query: {e}")))
}

/// Request body as text; a non-UTF-8 body is a validation error.
pub(crate) fn body_text(body: Result<String, StringRejection>) -> Result<String, ApiError> {
    body.map_err(|e| ApiError::Validation(e.body_text()))
}

/// Rows as a JSONEachRow response.
pub(crate) fn json_each_row<T: Serialize>(status: StatusCode, rows: &[T]) -> Result<Response, ApiError> {
    let body = to_json_each_row(rows).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((status, [(header::CONTENT_TYPE, JSON_EACH_ROW)], body).into_response())
}

/// Query flags that count as set when present with any value.
pub(crate) fn present(value: &Option<String>) -> bool {
    value.is_some()
}

/// Query flags parsed like `strconv.ParseBool`; anything unrecognised is false.
pub(crate) fn truthy(value: &Option<String>) -> bool {
    matches!(
        value.as_deref(),
        Some("1" | "t" | "T" | "true" | "TRUE" | "True")
    )
}
