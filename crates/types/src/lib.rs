// crates/types/src/lib.rs
//! Wire types shared by the backup controller crates.
//!
//! Everything here is plain data: ledger rows, response envelopes and the
//! listings the backup engine reports. Timestamps use the ClickHouse-compatible
//! `YYYY-MM-DD HH:MM:SS` format so the endpoints can back a `URL` table engine.

pub mod backup;
pub mod record;
pub mod response;

pub use backup::*;
pub use record::*;
pub use response::*;

use serde::Serialize;

/// Encode rows as JSONEachRow: one JSON document per line, newline terminated.
pub fn to_json_each_row<T: Serialize>(rows: &[T]) -> serde_json::Result<String> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}
