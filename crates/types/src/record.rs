// crates/types/src/record.rs
//! Ledger rows.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Time format understood by ClickHouse `DateTime` columns.
pub const API_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome state of one operation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    #[serde(rename = "in progress")]
    InProgress,
    #[serde(rename = "success")]
    Success,
    #[serde(rename = "error")]
    Error,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in progress",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

impl std::fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempted operation as recorded by the job ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Ledger-assigned sequence number. Internal only.
    #[serde(skip)]
    pub id: u64,
    /// Literal invocation, verb plus arguments.
    pub command: String,
    pub status: OperationStatus,
    #[serde(with = "api_time")]
    pub start: DateTime<Local>,
    #[serde(default, with = "api_time::option", skip_serializing_if = "Option::is_none")]
    pub finish: Option<DateTime<Local>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationRecord {
    pub fn in_progress(&self) -> bool {
        self.status == OperationStatus::InProgress
    }
}

/// Serde adapter for [`API_TIME_FORMAT`] timestamps in local time.
pub mod api_time {
    use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::API_TIME_FORMAT;

    pub fn serialize<S: Serializer>(t: &DateTime<Local>, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&t.format(API_TIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Local>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).map_err(de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<DateTime<Local>, String> {
        let naive = NaiveDateTime::parse_from_str(raw, API_TIME_FORMAT)
            .map_err(|e| format!("invalid timestamp {raw:?}: {e}"))?;
        Local
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| format!("timestamp {raw:?} does not exist in local time"))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            t: &Option<DateTime<Local>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match t {
                Some(t) => super::serialize(t, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Local>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                Some(raw) => parse(&raw).map(Some).map_err(de::Error::custom),
                None => Ok(None),
            }
        }
    }
}
