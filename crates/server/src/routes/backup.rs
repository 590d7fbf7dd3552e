// crates/server/src/routes/backup.rs
//! Backup listing and the per-verb operation endpoints.
//!
//! create/upload/download/restore are acknowledged with 201 as soon as the
//! ledger admits them. delete is awaited and answers 200 or 500.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use backup_controller_core::{operation::default_backup_name, EngineError, Operation};
use backup_controller_types::{
    ActionResponse, BackupListEntry, Location, OperationStatus, ResponseStatus,
};
use serde::Deserialize;

use super::{json_each_row, present, truthy, FirstQuery};
use crate::error::{ApiError, OperationError};
use crate::jobs::Dispatched;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateQuery {
    pub table: Option<String>,
    pub name: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    pub table: Option<String>,
    pub schema: Option<String>,
    #[serde(rename = "diff-from")]
    pub diff_from: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub table: Option<String>,
    pub schema: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RestoreQuery {
    pub table: Option<String>,
    pub schema: Option<String>,
    pub data: Option<String>,
    pub drop: Option<String>,
    pub rm: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl CreateQuery {
    pub fn into_operation(self) -> Operation {
        Operation::Create {
            schema_only: truthy(&self.schema),
            name: non_empty(self.name).unwrap_or_else(default_backup_name),
            table: non_empty(self.table),
        }
    }
}

impl UploadQuery {
    pub fn into_operation(self, name: String) -> Operation {
        Operation::Upload {
            name,
            schema_only: truthy(&self.schema),
            table: non_empty(self.table),
            diff_from: non_empty(self.diff_from),
        }
    }
}

impl DownloadQuery {
    pub fn into_operation(self, name: String) -> Operation {
        Operation::Download {
            name,
            schema_only: present(&self.schema),
            table: non_empty(self.table),
        }
    }
}

impl RestoreQuery {
    pub fn into_operation(self, name: String) -> Operation {
        Operation::Restore {
            name,
            schema_only: present(&self.schema),
            data_only: present(&self.data),
            drop_table: present(&self.drop) || present(&self.rm),
            table: non_empty(self.table),
        }
    }
}

/// Admit a detached operation and build its acknowledgement.
async fn acknowledge(state: &AppState, operation: Operation) -> Result<Response, OperationError> {
    let verb = operation.class().as_str();
    operation
        .check_arguments()
        .map_err(|e| ApiError::bad_command(e).for_operation(verb))?;
    let mut response = ActionResponse::acknowledged(verb).with_backup_name(operation.backup_name());
    if let Operation::Upload { diff_from, .. } = &operation {
        response = response.with_diff_from(diff_from.clone());
    }

    let command = operation.command_line();
    match state.dispatcher.dispatch(operation, command).await {
        Ok(_) => Ok((StatusCode::CREATED, Json(response)).into_response()),
        Err(conflict) => Err(ApiError::from(conflict).for_operation(verb)),
    }
}

/// GET /backup/tables - Tables the engine can back up.
pub async fn list_tables(State(state): State<Arc<AppState>>) -> Result<Response, OperationError> {
    let config = state.config.current();
    let tables = state
        .engine
        .tables(&config)
        .await
        .map_err(|e| ApiError::from(e).for_operation("tables"))?;
    Ok(json_each_row(StatusCode::OK, &tables)?)
}

/// GET /backup/list - Local backups, then remote ones.
pub async fn list_backups(State(state): State<Arc<AppState>>) -> Result<Response, OperationError> {
    let config = state.config.current();
    let mut entries: Vec<BackupListEntry> = state
        .engine
        .local_backups(&config)
        .await
        .map_err(|e| ApiError::from(e).for_operation("list"))?
        .iter()
        .map(|b| BackupListEntry::from_info(b, Location::Local))
        .collect();

    if config.general.has_remote_storage() {
        let remote = state
            .engine
            .remote_backups(&config)
            .await
            .map_err(|e| ApiError::from(e).for_operation("list"))?;
        entries.extend(remote.iter().map(|b| BackupListEntry::from_info(b, Location::Remote)));
    }
    Ok(json_each_row(StatusCode::OK, &entries)?)
}

/// POST /backup/create
pub async fn create_backup(
    State(state): State<Arc<AppState>>,
    query: Result<FirstQuery<CreateQuery>, ApiError>,
) -> Result<Response, OperationError> {
    let FirstQuery(query) = query.map_err(|e| e.for_operation("create"))?;
    acknowledge(&state, query.into_operation()).await
}

/// POST /backup/upload/{name}
pub async fn upload_backup(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    query: Result<FirstQuery<UploadQuery>, ApiError>,
) -> Result<Response, OperationError> {
    let FirstQuery(query) = query.map_err(|e| e.for_operation("upload"))?;
    acknowledge(&state, query.into_operation(name)).await
}

/// POST /backup/download/{name}
pub async fn download_backup(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    query: Result<FirstQuery<DownloadQuery>, ApiError>,
) -> Result<Response, OperationError> {
    let FirstQuery(query) = query.map_err(|e| e.for_operation("download"))?;
    acknowledge(&state, query.into_operation(name)).await
}

/// POST /backup/restore/{name}
pub async fn restore_backup(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    query: Result<FirstQuery<RestoreQuery>, ApiError>,
) -> Result<Response, OperationError> {
    let FirstQuery(query) = query.map_err(|e| e.for_operation("restore"))?;
    acknowledge(&state, query.into_operation(name)).await
}

/// POST /backup/delete/{where}/{name} - Runs inside the request.
pub async fn delete_backup(
    State(state): State<Arc<AppState>>,
    Path((location, name)): Path<(String, String)>,
) -> Result<Response, OperationError> {
    let location: Location = location
        .parse()
        .map_err(|e: backup_controller_types::UnknownLocation| {
            ApiError::Validation(e.to_string()).for_operation("delete")
        })?;

    let operation = Operation::Delete {
        location,
        name: name.clone(),
    };
    operation
        .check_arguments()
        .map_err(|e| ApiError::bad_command(e).for_operation("delete"))?;
    let command = operation.command_line();
    let record = match state.dispatcher.dispatch(operation, command).await {
        Ok(Dispatched::Completed(record)) => record,
        Ok(Dispatched::Acknowledged(_)) => {
            return Err(ApiError::Internal("delete was not awaited".into()).for_operation("delete"))
        }
        Err(conflict) => return Err(ApiError::from(conflict).for_operation("delete")),
    };

    if record.status == OperationStatus::Success {
        let body = ActionResponse::new(ResponseStatus::Success, "delete")
            .with_backup_name(name)
            .with_location(location);
        Ok((StatusCode::OK, Json(body)).into_response())
    } else {
        let message = record.error.unwrap_or_else(|| "delete failed".to_string());
        Err(ApiError::from(EngineError::Other(message)).for_operation("delete"))
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/backup/tables", get(list_tables))
        .route("/backup/list", get(list_backups))
        .route("/backup/create", post(create_backup))
        .route("/backup/upload/{name}", post(upload_backup))
        .route("/backup/download/{name}", post(download_backup))
        .route("/backup/restore/{name}", post(restore_backup))
        .route("/backup/delete/{where}/{name}", post(delete_backup))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_query_defaults_name() {
        let op = CreateQuery::default().into_operation();
        let Operation::Create { name, table, schema_only } = op else {
            panic!("expected create");
        };
        assert_eq!(name.len(), "2024-01-01T00-00-00".len());
        assert_eq!(table, None);
        assert!(!schema_only);
    }

    #[test]
    fn test_create_schema_is_parsed_as_bool() {
        let query = CreateQuery {
            schema: Some("false".into()),
            name: Some("nightly".into()),
            ..Default::default()
        };
        assert_eq!(
            query.into_operation(),
            Operation::Create {
                name: "nightly".into(),
                table: None,
                schema_only: false,
            }
        );
    }

    #[test]
    fn test_restore_flags_by_presence() {
        let query = RestoreQuery {
            schema: Some(String::new()),
            rm: Some(String::new()),
            table: Some("db.*".into()),
            ..Default::default()
        };
        assert_eq!(
            query.into_operation("nightly".into()),
            Operation::Restore {
                name: "nightly".into(),
                table: Some("db.*".into()),
                schema_only: true,
                data_only: false,
                drop_table: true,
            }
        );
    }

    #[test]
    fn test_upload_empty_diff_from_is_full() {
        let query = UploadQuery {
            diff_from: Some(String::new()),
            ..Default::default()
        };
        let Operation::Upload { diff_from, .. } = query.into_operation("b".into()) else {
            panic!("expected upload");
        };
        assert_eq!(diff_from, None);
    }
}
