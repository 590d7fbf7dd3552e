// crates/types/src/backup.rs
//! Listings reported by the backup engine.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::API_TIME_FORMAT;

/// Where a backup lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Local,
    Remote,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("backup location must be 'local' or 'remote', got {0:?}")]
pub struct UnknownLocation(pub String);

impl Location {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Location {
    type Err = UnknownLocation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(UnknownLocation(other.to_string())),
        }
    }
}

/// A backup as reported by the engine, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub name: String,
    pub created: DateTime<Local>,
    #[serde(default)]
    pub size: u64,
}

/// A table the engine can back up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub database: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    #[serde(default)]
    pub skip: bool,
}

/// One row of `GET /backup/list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupListEntry {
    pub name: String,
    pub created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub location: Location,
}

impl BackupListEntry {
    /// Local listings never report a size, matching the remote-only size column.
    pub fn from_info(info: &BackupInfo, location: Location) -> Self {
        Self {
            name: info.name.clone(),
            created: info.created.format(API_TIME_FORMAT).to_string(),
            size: match location {
                Location::Local => None,
                Location::Remote => Some(info.size),
            },
            location,
        }
    }
}
