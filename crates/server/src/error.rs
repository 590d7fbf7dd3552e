// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use backup_controller_core::{CommandError, ConfigError, Conflict, EngineError};
use backup_controller_types::ErrorBody;
use thiserror::Error;

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Locked(Conflict),

    /// Unknown verb or malformed action line. `line` is 1-based when the
    /// command came from a batch.
    #[error("{}", bad_command_message(.line, .source))]
    BadCommand {
        line: Option<usize>,
        #[source]
        source: CommandError,
    },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    NotFound(String),

    #[error("405 Method Not Allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    Internal(String),
}

fn bad_command_message(line: &Option<usize>, source: &CommandError) -> String {
    match line {
        Some(n) => format!("line {n}: {source}"),
        None => source.to_string(),
    }
}

impl ApiError {
    pub fn bad_command(source: CommandError) -> Self {
        Self::BadCommand { line: None, source }
    }

    pub fn bad_command_at(line: usize, source: CommandError) -> Self {
        Self::BadCommand {
            line: Some(line),
            source,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Locked(_) => StatusCode::LOCKED,
            Self::BadCommand { .. } | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Engine(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Attach the verb the request was for.
    pub fn for_operation(self, operation: impl Into<String>) -> OperationError {
        OperationError {
            operation: Some(operation.into()),
            error: self,
        }
    }
}

impl From<Conflict> for ApiError {
    fn from(c: Conflict) -> Self {
        Self::Locked(c)
    }
}

impl From<ConfigError> for ApiError {
    fn from(e: ConfigError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        OperationError {
            operation: None,
            error: self,
        }
        .into_response()
    }
}

/// An [`ApiError`] tagged with the operation it belongs to, rendered as
/// `{"status":"error","operation":..,"error":..}`.
#[derive(Debug)]
pub struct OperationError {
    pub operation: Option<String>,
    pub error: ApiError,
}

impl From<ApiError> for OperationError {
    fn from(error: ApiError) -> Self {
        Self {
            operation: None,
            error,
        }
    }
}

impl IntoResponse for OperationError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let operation = self.operation.as_deref().unwrap_or("-");
        match &self.error {
            ApiError::Locked(_) => {
                tracing::warn!(operation, "Rejected: operation in progress");
            }
            ApiError::BadCommand { line, source } => {
                tracing::warn!(operation, line = ?line, error = %source, "Bad command");
            }
            ApiError::Validation(msg) => {
                tracing::warn!(operation, message = %msg, "Bad request");
            }
            ApiError::NotFound(msg) => {
                tracing::debug!(message = %msg, "Not found");
            }
            ApiError::MethodNotAllowed => {
                tracing::debug!("Method not allowed");
            }
            ApiError::Engine(e) => {
                tracing::error!(operation, error = %e, "Backup engine failed");
            }
            ApiError::Internal(msg) => {
                tracing::error!(operation, message = %msg, "Internal server error");
            }
        }

        let body = ErrorBody::new(self.operation, self.error.to_string());
        (status, Json(body)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn extract_response(response: Response) -> (StatusCode, ErrorBody) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_body: ErrorBody = serde_json::from_slice(&body).unwrap();
        (status, error_body)
    }

    #[tokio::test]
    async fn test_conflict_returns_423_with_operation() {
        let response = ApiError::from(Conflict).for_operation("create").into_response();
        let (status, body) = extract_response(response).await;

        assert_eq!(status, StatusCode::LOCKED);
        assert_eq!(body.status, "error");
        assert_eq!(body.operation.as_deref(), Some("create"));
        assert_eq!(body.error, "another operation is currently running");
    }

    #[tokio::test]
    async fn test_bad_command_names_line() {
        let err = ApiError::bad_command_at(2, CommandError::UnknownCommand("freeze".into()));
        let (status, body) = extract_response(err.into_response()).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.starts_with("line 2: "));
        assert!(body.error.contains("freeze"));
        assert_eq!(body.operation, None);
    }

    #[tokio::test]
    async fn test_engine_error_returns_500() {
        let err = ApiError::from(EngineError::Other("no such backup".into()));
        let (status, body) = extract_response(err.for_operation("delete").into_response()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "no such backup");
    }

    #[tokio::test]
    async fn test_method_not_allowed_is_json() {
        let (status, body) = extract_response(ApiError::MethodNotAllowed.into_response()).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body.status, "error");
        assert_eq!(body.error, "405 Method Not Allowed");
    }

    #[tokio::test]
    async fn test_config_error_is_validation() {
        let err = ApiError::from(ConfigError::Invalid("engine.binary must be set".into()));
        let (status, body) = extract_response(err.into_response()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.error.contains("engine.binary"));
    }
}
