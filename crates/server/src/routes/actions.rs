// crates/server/src/routes/actions.rs
//! Ledger views and batch command submission.
//!
//! Both ledger endpoints speak JSONEachRow so a ClickHouse `URL` table can
//! read from and insert into them:
//!
//! ```sql
//! CREATE TABLE system.backup_actions (command String, start DateTime, finish DateTime, status String, error String)
//! ENGINE = URL('http://127.0.0.1:7171/backup/actions?user=user&pass=pass', JSONEachRow);
//! INSERT INTO system.backup_actions (command) VALUES ('create nightly');
//! ```

use std::sync::Arc;

use axum::{
    extract::{rejection::StringRejection, State},
    http::StatusCode,
    response::Response,
    routing::get,
    Router,
};
use backup_controller_core::{
    operation::ActionRow, parse_command, CommandError, EngineError,
};
use backup_controller_types::{ActionResponse, OperationStatus, ResponseStatus};

use super::{body_text, json_each_row};
use crate::error::{ApiError, ApiResult, OperationError};
use crate::jobs::Dispatched;
use crate::state::AppState;

/// GET /backup/status, GET /backup/actions - Every ledger record, oldest first.
pub async fn ledger_snapshot(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    json_each_row(StatusCode::OK, &state.ledger.snapshot())
}

/// POST /backup/actions - Dispatch one command per body line.
///
/// Lines run in order and the first failure ends the batch. Operations
/// dispatched by earlier lines stay committed.
pub async fn submit_actions(
    State(state): State<Arc<AppState>>,
    body: Result<String, StringRejection>,
) -> Result<Response, OperationError> {
    let body = body_text(body)?;
    if body.trim().is_empty() {
        return Err(ApiError::Validation("empty request".to_string()).into());
    }

    let mut responses = Vec::new();
    for (idx, line) in body.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let row: ActionRow = serde_json::from_str(line).map_err(|e| {
            ApiError::bad_command_at(line_no, CommandError::MalformedRow(e.to_string()))
        })?;
        tracing::info!(line = line_no, command = %row.command, "action received");
        let operation = parse_command(&row.command)
            .map_err(|e| ApiError::bad_command_at(line_no, e).for_operation(row.command.clone()))?;

        match state.dispatcher.dispatch(operation, row.command.clone()).await {
            Ok(Dispatched::Acknowledged(_)) => {
                responses.push(ActionResponse::acknowledged(row.command));
            }
            Ok(Dispatched::Completed(record)) if record.status == OperationStatus::Success => {
                responses.push(ActionResponse::new(ResponseStatus::Ok, row.command));
            }
            Ok(Dispatched::Completed(record)) => {
                let message = record.error.unwrap_or_else(|| "operation failed".to_string());
                return Err(ApiError::from(EngineError::Other(message)).for_operation(row.command));
            }
            Err(conflict) => return Err(ApiError::from(conflict).for_operation(row.command)),
        }
    }

    Ok(json_each_row(StatusCode::CREATED, &responses)?)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/backup/status", get(ledger_snapshot))
        .route("/backup/actions", get(ledger_snapshot).post(submit_actions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request};
    use backup_controller_core::Config;
    use tower::ServiceExt;

    use crate::testing::FakeEngine;

    fn app() -> Router {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let state = AppState::new(Config::default(), Arc::new(FakeEngine::new()), tx);
        router().with_state(state)
    }

    async fn post(app: Router, body: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/backup/actions")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_empty_body_rejected() {
        let (status, body) = post(app(), "\n  \n").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("empty request"));
    }

    #[tokio::test]
    async fn test_unknown_verb_names_line() {
        let (status, body) = post(app(), "\n{\"command\":\"freeze db\"}\n").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("line 2: "), "{body}");
        assert!(body.contains("freeze"));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_command() {
        let (status, body) = post(app(), "{command: create}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("line 1: malformed action row"), "{body}");
    }

    #[tokio::test]
    async fn test_empty_ledger_snapshot_is_empty_body() {
        let response = app()
            .oneshot(Request::builder().uri("/backup/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }
}
