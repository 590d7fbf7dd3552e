// crates/core/src/lib.rs
//! Core of the backup controller: configuration, the operation model, the job
//! ledger and the backup engine seam.

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod operation;

pub use config::{Config, LogConfig, LogFormat, SharedConfig};
pub use engine::{BackupEngine, CliEngine};
pub use error::{CommandError, ConfigError, Conflict, EngineError};
pub use ledger::{JobLedger, Ticket};
pub use operation::{parse_action_row, parse_command, CommandClass, Operation};
