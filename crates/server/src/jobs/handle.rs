// crates/server/src/jobs/handle.rs
//! Completion handle for a dispatched operation.

use backup_controller_types::OperationRecord;
use tokio::sync::oneshot;

/// Resolves to the finished ledger record once the operation completes.
///
/// HTTP handlers drop it; tests await it instead of polling the ledger.
#[derive(Debug)]
pub struct JobHandle {
    id: u64,
    command: String,
    done: oneshot::Receiver<Option<OperationRecord>>,
}

impl JobHandle {
    pub(crate) fn new(
        id: u64,
        command: impl Into<String>,
        done: oneshot::Receiver<Option<OperationRecord>>,
    ) -> Self {
        Self {
            id,
            command: command.into(),
            done,
        }
    }

    /// Ledger id of the record this handle tracks.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Wait for the operation to finish.
    ///
    /// `None` if the record was pruned from the ledger before it finished or
    /// the runtime shut down first.
    pub async fn wait(self) -> Option<OperationRecord> {
        self.done.await.ok().flatten()
    }
}
