//! Hub configuration.
//!
//! Loaded from YAML. Every field has a default, so a missing file or a
//! partial document is fine.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

use nodestatus_realtime::{PushConfig, DEFAULT_PUSH_INTERVAL};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Configuration for the NodeStatus hub.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct Config {
    /// HTTP/WebSocket listen address.
    pub listen: SocketAddr,
    /// Path of the YAML server registry.
    pub registry_path: PathBuf,
    /// Log level.
    pub log_level: String,
    /// Emit JSON logs.
    pub log_json: bool,
    /// Viewer push settings.
    #[validate(nested)]
    pub push: PushSettings,
    /// Seconds between two registry reconciliations.
    #[validate(range(min = 1))]
    pub reconcile_interval_secs: u64,
    /// Outbound notifications.
    #[validate(nested)]
    pub notify: NotifySettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 35601)),
            registry_path: PathBuf::from("servers.yaml"),
            log_level: "info".to_string(),
            log_json: false,
            push: PushSettings::default(),
            reconcile_interval_secs: 30,
            notify: NotifySettings::default(),
        }
    }
}

impl Config {
    /// Loads and validates the configuration at `path`, falling back to
    /// defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_yaml(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                Self::default()
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML document without validating it.
    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes to null.
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Interval between two registry reconciliations.
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

/// Viewer push settings.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct PushSettings {
    /// Keep pushing after the initial snapshot.
    pub enabled: bool,
    /// Milliseconds between two pushes.
    #[validate(range(min = 100, max = 60000))]
    pub interval_ms: u64,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: DEFAULT_PUSH_INTERVAL.as_millis() as u64,
        }
    }
}

impl From<&PushSettings> for PushConfig {
    fn from(settings: &PushSettings) -> Self {
        PushConfig {
            enabled: settings.enabled,
            interval: Duration::from_millis(settings.interval_ms),
        }
    }
}

/// Outbound notification settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
#[serde(default)]
pub struct NotifySettings {
    /// Receives a JSON POST for every node lifecycle event.
    #[validate(url)]
    pub webhook_url: Option<String>,
}
