// crates/core/src/ledger.rs
//! In-memory history of operation attempts and the single-flight gate.

use std::collections::VecDeque;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use backup_controller_types::{OperationRecord, OperationStatus};
use chrono::Local;

use crate::error::Conflict;

/// Proof that an operation was admitted. Consumed by [`JobLedger::finish`],
/// so each record is finalized at most once.
#[derive(Debug)]
#[must_use = "an admitted operation must be finished"]
pub struct Ticket {
    id: u64,
    command: String,
}

impl Ticket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: VecDeque<OperationRecord>,
    next_id: u64,
}

impl Inner {
    fn busy(&self) -> bool {
        self.records.back().is_some_and(OperationRecord::in_progress)
    }
}

/// Append-only operation log.
///
/// At most one record is in progress and it is always the last one, because
/// records are only appended through [`JobLedger::try_begin`], which refuses
/// while the last record is still running.
#[derive(Debug, Default)]
pub struct JobLedger {
    inner: RwLock<Inner>,
    /// 0 keeps every record.
    max_records: usize,
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `max_records` rows, dropping the oldest finished ones.
    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            inner: RwLock::default(),
            max_records,
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit `command` if nothing is running, appending an in-progress record.
    pub fn try_begin(&self, command: impl Into<String>) -> Result<Ticket, Conflict> {
        let mut inner = self.write();
        if inner.busy() {
            return Err(Conflict);
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let command = command.into();
        inner.records.push_back(OperationRecord {
            id,
            command: command.clone(),
            status: OperationStatus::InProgress,
            start: Local::now(),
            finish: None,
            error: None,
        });
        self.prune(&mut inner);
        Ok(Ticket { id, command })
    }

    /// Finalize the ticket's record: success when `error` is `None`.
    ///
    /// Returns the finished record, or `None` if it was pruned meanwhile.
    pub fn finish(&self, ticket: Ticket, error: Option<String>) -> Option<OperationRecord> {
        let mut inner = self.write();
        let record = inner.records.iter_mut().rev().find(|r| r.id == ticket.id)?;
        record.status = match error {
            Some(_) => OperationStatus::Error,
            None => OperationStatus::Success,
        };
        record.finish = Some(Local::now());
        record.error = error;
        let finished = record.clone();
        self.prune(&mut inner);
        Some(finished)
    }

    pub fn is_in_progress(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .busy()
    }

    /// Owned copy of the history, oldest first.
    pub fn snapshot(&self) -> Vec<OperationRecord> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` holding the write lock, provided nothing is running.
    /// No operation can be admitted until `f` returns.
    pub fn while_idle<T>(&self, f: impl FnOnce() -> T) -> Result<T, Conflict> {
        let inner = self.write();
        if inner.busy() {
            return Err(Conflict);
        }
        let out = f();
        drop(inner);
        Ok(out)
    }

    fn prune(&self, inner: &mut Inner) {
        if self.max_records == 0 {
            return;
        }
        while inner.records.len() > self.max_records {
            match inner.records.front() {
                Some(oldest) if !oldest.in_progress() => {
                    inner.records.pop_front();
                }
                _ => break,
            }
        }
    }
}
