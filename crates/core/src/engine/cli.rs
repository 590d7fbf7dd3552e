// crates/core/src/engine/cli.rs
//! `BackupEngine` backed by the backup tool's command line.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use backup_controller_types::{BackupInfo, Location, TableInfo};
use serde::de::DeserializeOwned;
use tokio::process::Command as TokioCommand;

use super::BackupEngine;
use crate::config::Config;
use crate::error::EngineError;
use crate::operation::Operation;

/// Longest stderr excerpt kept in an error.
const STDERR_LIMIT: usize = 500;

/// Spawns `<engine.binary> [-c <engine.config_file>] <args>` per call.
#[derive(Debug, Clone, Default)]
pub struct CliEngine;

impl CliEngine {
    pub fn new() -> Self {
        Self
    }

    fn command(config: &Config, args: &[String]) -> TokioCommand {
        let mut cmd = TokioCommand::new(&config.engine.binary);
        if let Some(file) = &config.engine.config_file {
            cmd.arg("-c").arg(file);
        }
        cmd.args(args)
            // Null stdin so the tool never blocks on a prompt
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false);
        cmd
    }

    /// Run to completion and return stdout.
    async fn run(&self, config: &Config, args: Vec<String>) -> Result<String, EngineError> {
        let t0 = Instant::now();
        let binary = config.engine.binary.clone();
        let command = format!("{binary} {}", args.join(" "));
        tracing::debug!(%command, "engine: spawning");

        let output = Self::command(config, &args)
            .output()
            .await
            .map_err(|source| {
                tracing::error!(%command, error = %source, "engine: failed to spawn process");
                EngineError::Spawn { binary, source }
            })?;

        let elapsed_ms = t0.elapsed().as_millis() as u64;
        if !output.status.success() {
            let stderr = excerpt(&String::from_utf8_lossy(&output.stderr));
            tracing::warn!(
                %command,
                elapsed_ms,
                exit_code = ?output.status.code(),
                stderr = %stderr,
                "engine: non-zero exit"
            );
            return Err(EngineError::Failed {
                command,
                code: output.status.code(),
                stderr,
            });
        }

        tracing::debug!(%command, elapsed_ms, stdout_len = output.stdout.len(), "engine: finished");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn list(&self, config: &Config, location: Location) -> Result<Vec<BackupInfo>, EngineError> {
        let args = ["list", location.as_str(), "--format", "json"]
            .map(String::from)
            .to_vec();
        let stdout = self.run(config, args).await?;
        parse_listing(&format!("{location} backup list"), &stdout)
    }
}

fn excerpt(text: &str) -> String {
    text.trim().chars().take(STDERR_LIMIT).collect()
}

/// Decode a JSON array printed by the tool. Empty output means no rows.
pub fn parse_listing<T: DeserializeOwned>(what: &str, stdout: &str) -> Result<Vec<T>, EngineError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).map_err(|e| {
        tracing::warn!(what, stdout = %excerpt(trimmed), "engine: returned non-JSON");
        EngineError::Output {
            what: what.to_string(),
            message: e.to_string(),
        }
    })
}

#[async_trait]
impl BackupEngine for CliEngine {
    async fn tables(&self, config: &Config) -> Result<Vec<TableInfo>, EngineError> {
        let args = ["tables", "--format", "json"].map(String::from).to_vec();
        let stdout = self.run(config, args).await?;
        parse_listing("table list", &stdout)
    }

    async fn local_backups(&self, config: &Config) -> Result<Vec<BackupInfo>, EngineError> {
        self.list(config, Location::Local).await
    }

    async fn remote_backups(&self, config: &Config) -> Result<Vec<BackupInfo>, EngineError> {
        self.list(config, Location::Remote).await
    }

    async fn execute(&self, config: &Config, operation: &Operation) -> Result<(), EngineError> {
        self.run(config, operation.to_args()).await.map(drop)
    }

    fn name(&self) -> &str {
        "cli"
    }
}
