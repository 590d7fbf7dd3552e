// crates/core/src/engine/mod.rs
//! The backup engine: the component that actually creates, moves, restores and
//! deletes backup artifacts. The controller only sequences calls into it.

pub mod cli;

use async_trait::async_trait;
use backup_controller_types::{BackupInfo, TableInfo};

use crate::config::Config;
use crate::error::EngineError;
use crate::operation::Operation;

pub use cli::CliEngine;

/// Every call receives the configuration snapshot taken when the request was
/// dispatched, so a reload never changes the settings of a running operation.
#[async_trait]
pub trait BackupEngine: Send + Sync {
    /// Tables the engine would back up.
    async fn tables(&self, config: &Config) -> Result<Vec<TableInfo>, EngineError>;

    /// Local backups, oldest first.
    async fn local_backups(&self, config: &Config) -> Result<Vec<BackupInfo>, EngineError>;

    /// Remote backups, oldest first.
    async fn remote_backups(&self, config: &Config) -> Result<Vec<BackupInfo>, EngineError>;

    /// Run one maintenance operation to completion.
    async fn execute(&self, config: &Config, operation: &Operation) -> Result<(), EngineError>;

    /// Engine name for logging.
    fn name(&self) -> &str;
}
