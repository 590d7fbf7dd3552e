// crates/core/src/config.rs
//! Server configuration: YAML model, loading, validation and the shared handle
//! that lets a reload swap the whole value at once.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::error::ConfigError;

/// Placeholder written over secrets when the active config is displayed.
pub const REDACTED: &str = "***";

/// Remote storage value that disables every remote listing.
pub const NO_REMOTE_STORAGE: &str = "none";

/// Full configuration. Every section falls back to its defaults, so a partial
/// YAML document is merged over [`Config::default`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub api: ApiConfig,
    pub engine: EngineConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Remote storage kind used by the engine, or `none`.
    pub remote_storage: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            remote_storage: NO_REMOTE_STORAGE.to_string(),
        }
    }
}

impl GeneralConfig {
    pub fn has_remote_storage(&self) -> bool {
        self.remote_storage != NO_REMOTE_STORAGE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen_addr: String,
    pub enable_metrics: bool,
    pub username: String,
    pub password: String,
    /// Serve HTTPS using `certificate_file` and `private_key_file`.
    pub secure: bool,
    pub certificate_file: Option<PathBuf>,
    pub private_key_file: Option<PathBuf>,
    /// Keep at most this many finished ledger rows. 0 keeps everything.
    pub max_actions_history: usize,
    /// How long a closing listener may drain in-flight requests.
    pub shutdown_grace_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_addr: "localhost:7171".to_string(),
            enable_metrics: true,
            username: String::new(),
            password: String::new(),
            secure: false,
            certificate_file: None,
            private_key_file: None,
            max_actions_history: 0,
            shutdown_grace_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Backup tool invoked for every operation.
    pub binary: String,
    /// Passed to the backup tool as `-c <file>` when set.
    pub config_file: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: "clickhouse-backup".to_string(),
            config_file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `info,backup_controller_server=debug`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Read and validate a config file. A missing file is an error here; the
    /// binary decides separately whether to start from defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
        let config = Self::from_yaml(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML over the defaults. Does not validate.
    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let api = &self.api;
        match api.listen_addr.rsplit_once(':') {
            Some((_, port)) if port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "api.listen_addr {:?} must be host:port",
                    api.listen_addr
                )))
            }
        }
        if api.secure && (api.certificate_file.is_none() || api.private_key_file.is_none()) {
            return Err(ConfigError::Invalid(
                "api.secure requires api.certificate_file and api.private_key_file".to_string(),
            ));
        }
        if self.general.remote_storage.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "general.remote_storage must be set (use {NO_REMOTE_STORAGE:?} to disable)"
            )));
        }
        if self.engine.binary.trim().is_empty() {
            return Err(ConfigError::Invalid("engine.binary must be set".to_string()));
        }
        validate_log_directive(&self.log.level)?;
        Ok(())
    }

    /// Copy with credentials replaced by [`REDACTED`].
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.api.password.is_empty() {
            copy.api.password = REDACTED.to_string();
        }
        copy
    }
}

/// Accepts `level` and `target=level` parts separated by commas.
fn validate_log_directive(directive: &str) -> Result<(), ConfigError> {
    if directive.trim().is_empty() {
        return Err(ConfigError::Invalid("log.level must be set".to_string()));
    }
    for part in directive.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let level = part.rsplit_once('=').map_or(part, |(_, level)| level);
        LevelFilter::from_str(level).map_err(|_| {
            ConfigError::Invalid(format!("log.level: unknown level {level:?} in {part:?}"))
        })?;
    }
    Ok(())
}

/// Process-wide configuration handle.
///
/// Readers take an `Arc<Config>` snapshot; a reload publishes a new `Arc`.
/// Nobody ever observes a partially updated config.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    inner: Arc<RwLock<Arc<Config>>>,
}

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    pub fn current(&self) -> Arc<Config> {
        Arc::clone(&self.inner.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Publish `config`, returning the value it replaced.
    pub fn replace(&self, config: Config) -> Arc<Config> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(config))
    }
}
