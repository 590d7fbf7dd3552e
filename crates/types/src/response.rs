// crates/types/src/response.rs
//! Response envelopes for state-changing endpoints.

use serde::{Deserialize, Serialize};

use crate::backup::Location;

/// `status` field of an [`ActionResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Detached operation accepted; outcome is reported through the ledger.
    Acknowledged,
    /// Synchronous operation submitted through the batch endpoint finished.
    Ok,
    /// Synchronous operation finished.
    Success,
}

/// Envelope returned by create/upload/download/restore/delete and batch actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: ResponseStatus,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ActionResponse {
    pub fn new(status: ResponseStatus, operation: impl Into<String>) -> Self {
        Self {
            status,
            operation: operation.into(),
            backup_name: None,
            backup_from: None,
            diff: None,
            location: None,
        }
    }

    pub fn acknowledged(operation: impl Into<String>) -> Self {
        Self::new(ResponseStatus::Acknowledged, operation)
    }

    pub fn with_backup_name(mut self, name: impl Into<String>) -> Self {
        self.backup_name = Some(name.into());
        self
    }

    /// Sets `diff` and, for incremental uploads, `backup_from`.
    pub fn with_diff_from(mut self, from: Option<String>) -> Self {
        self.diff = Some(from.is_some());
        self.backup_from = from;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always `"error"`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    pub error: String,
}

impl ErrorBody {
    pub fn new(operation: Option<String>, error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            operation,
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acknowledged_create_shape() {
        let resp = ActionResponse::acknowledged("create").with_backup_name("nightly");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"status": "acknowledged", "operation": "create", "backup_name": "nightly"})
        );
    }

    #[test]
    fn test_upload_diff_fields() {
        let full = ActionResponse::acknowledged("upload").with_diff_from(None);
        assert_eq!(full.diff, Some(false));
        assert_eq!(full.backup_from, None);

        let incremental = ActionResponse::acknowledged("upload").with_diff_from(Some("base".into()));
        let json = serde_json::to_string(&incremental).unwrap();
        assert!(json.contains("\"diff\":true"));
        assert!(json.contains("\"backup_from\":\"base\""));
    }

    #[test]
    fn test_delete_success_carries_location() {
        let resp = ActionResponse::new(ResponseStatus::Success, "delete")
            .with_backup_name("old")
            .with_location(Location::Remote);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"success\""));
        assert!(json.contains("\"location\":\"remote\""));
    }

    #[test]
    fn test_error_body() {
        let body = ErrorBody::new(Some("create".into()), "another operation is currently running");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["operation"], "create");
    }
}
