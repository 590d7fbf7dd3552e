// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Returned when a mutating operation is requested while another one runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("another operation is currently running")]
pub struct Conflict;

/// Errors that can occur while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors that can occur when turning an action line into an operation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("malformed action row: {0}")]
    MalformedRow(String),

    #[error("cannot split command {0:?}: unbalanced quotes or trailing escape")]
    Tokenize(String),

    #[error("empty command")]
    Empty,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("{verb}: {message}")]
    InvalidArguments { verb: String, message: String },

    #[error("{0}: arguments must not contain NUL bytes")]
    NulByte(String),
}

/// Errors reported by the backup engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` {}: {stderr}", exit_status(.code))]
    Failed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Unreadable {what} output: {message}")]
    Output { what: String, message: String },

    #[error("{0}")]
    Other(String),
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_message() {
        assert_eq!(Conflict.to_string(), "another operation is currently running");
    }

    #[test]
    fn test_engine_failure_display() {
        let err = EngineError::Failed {
            command: "clickhouse-backup create nightly".into(),
            code: Some(1),
            stderr: "can't connect to clickhouse".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("create nightly"));
        assert!(msg.contains("exited with status 1: "), "{msg}");
        assert!(!msg.contains("Some("));
        assert!(msg.contains("can't connect"));
    }

    #[test]
    fn test_engine_killed_by_signal_display() {
        let err = EngineError::Failed {
            command: "clickhouse-backup upload nightly".into(),
            code: None,
            stderr: String::new(),
        };
        assert_eq!(
            err.to_string(),
            "`clickhouse-backup upload nightly` was terminated by a signal: "
        );
    }

    #[test]
    fn test_config_io_error_keeps_path() {
        let err = ConfigError::io(
            "/etc/backup/config.yml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/etc/backup/config.yml"));
    }
}
