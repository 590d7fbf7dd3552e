// crates/server/src/testing.rs
//! Scriptable in-memory engine for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use backup_controller_core::{BackupEngine, Config, EngineError, Operation};
use backup_controller_types::{BackupInfo, TableInfo};
use tokio::sync::Semaphore;

#[derive(Default)]
struct Script {
    executed: Vec<Operation>,
    failures: HashMap<&'static str, String>,
    panics: Vec<&'static str>,
    local: Vec<BackupInfo>,
    remote: Vec<BackupInfo>,
    tables: Vec<TableInfo>,
    remote_listings: usize,
}

/// Engine whose operations succeed unless told otherwise.
///
/// A gated engine holds every `execute` call until [`FakeEngine::release`]
/// hands out a permit, which keeps in-progress states deterministic.
#[derive(Clone, Default)]
pub struct FakeEngine {
    script: Arc<Mutex<Script>>,
    gate: Option<Arc<Semaphore>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            script: Arc::default(),
            gate: Some(Arc::new(Semaphore::new(0))),
        }
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Let `n` held operations proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Make every operation with this verb fail with `message`.
    pub fn fail(&self, verb: &'static str, message: impl Into<String>) {
        self.script().failures.insert(verb, message.into());
    }

    /// Make every operation with this verb panic.
    pub fn panic_on(&self, verb: &'static str) {
        self.script().panics.push(verb);
    }

    pub fn set_local_backups(&self, backups: Vec<BackupInfo>) {
        self.script().local = backups;
    }

    pub fn set_remote_backups(&self, backups: Vec<BackupInfo>) {
        self.script().remote = backups;
    }

    pub fn set_tables(&self, tables: Vec<TableInfo>) {
        self.script().tables = tables;
    }

    /// Operations that reached the engine, in call order.
    pub fn executed(&self) -> Vec<Operation> {
        self.script().executed.clone()
    }

    /// How often the remote listing was requested.
    pub fn remote_listings(&self) -> usize {
        self.script().remote_listings
    }
}

#[async_trait]
impl BackupEngine for FakeEngine {
    async fn tables(&self, _config: &Config) -> Result<Vec<TableInfo>, EngineError> {
        Ok(self.script().tables.clone())
    }

    async fn local_backups(&self, _config: &Config) -> Result<Vec<BackupInfo>, EngineError> {
        Ok(self.script().local.clone())
    }

    async fn remote_backups(&self, _config: &Config) -> Result<Vec<BackupInfo>, EngineError> {
        let mut script = self.script();
        script.remote_listings += 1;
        Ok(script.remote.clone())
    }

    async fn execute(&self, _config: &Config, operation: &Operation) -> Result<(), EngineError> {
        self.script().executed.push(operation.clone());
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| EngineError::Other(e.to_string()))?
                .forget();
        }

        let verb = operation.class().as_str();
        let (panics, failure) = {
            let script = self.script();
            (script.panics.contains(&verb), script.failures.get(verb).cloned())
        };
        if panics {
            panic!("fake engine told to panic on {verb}");
        }
        match failure {
            Some(message) => Err(EngineError::Other(message)),
            None => Ok(()),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}
