//! Configuration for the ecoiot CLI.
//!
//! A TOML document describing one gateway and its devices, layered with
//! `ECOIOT_`-prefixed environment variables, validated and translated to
//! `ecoiot_core::CoordinatorConfig`.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use ecoiot_core::{CoordinatorConfig, DeviceDescriptor, DeviceModel};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Gateway address.
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_poll_deadline")]
    pub poll_deadline_secs: u64,

    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            poll_interval_secs: default_poll_interval(),
            poll_deadline_secs: default_poll_deadline(),
            command_timeout_secs: default_command_timeout(),
            settle_delay_ms: default_settle_delay(),
            devices: Vec::new(),
        }
    }
}

fn default_poll_interval() -> u64 {
    30
}
fn default_poll_deadline() -> u64 {
    10
}
fn default_command_timeout() -> u64 {
    10
}
fn default_settle_delay() -> u64 {
    1000
}

/// One `[[devices]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeviceEntry {
    pub id: DeviceId,
    pub model: DeviceModel,
    /// Display name.
    pub nickname: Option<String>,
    /// Firmware version, informational only.
    pub version: Option<String>,
}

/// Device ids may be written as integers or as strings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DeviceId {
    Number(u64),
    Text(String),
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s.trim()),
        }
    }
}

impl DeviceEntry {
    fn to_descriptor(&self) -> DeviceDescriptor {
        let mut device = DeviceDescriptor::new(self.id.to_string(), self.model);
        if let Some(name) = self.nickname.as_deref().filter(|n| !n.trim().is_empty()) {
            device = device.with_name(name);
        }
        if let Some(version) = &self.version {
            device = device.with_version(version);
        }
        device
    }
}

impl Config {
    /// Check the document and translate it for the coordinator.
    pub fn to_coordinator_config(&self) -> Result<CoordinatorConfig, ConfigError> {
        if self.host.trim().is_empty() {
            return Err(invalid("host", "gateway host is required"));
        }
        if self.poll_deadline_secs == 0 {
            return Err(invalid("poll_deadline_secs", "must be greater than zero"));
        }
        if self.command_timeout_secs == 0 {
            return Err(invalid("command_timeout_secs", "must be greater than zero"));
        }

        let mut seen = HashSet::new();
        let mut devices = Vec::with_capacity(self.devices.len());
        for entry in &self.devices {
            let device = entry.to_descriptor();
            let Ok(wire_id) = device.numeric_id() else {
                return Err(invalid(
                    "devices.id",
                    format!("'{}' is not a numeric device id", device.id),
                ));
            };
            // "010" and "10" address the same device on the wire.
            if !seen.insert(wire_id) {
                return Err(invalid(
                    "devices.id",
                    format!("duplicate device id '{}'", device.id),
                ));
            }
            devices.push(device);
        }

        let mut cfg = CoordinatorConfig::new(self.host.trim(), devices);
        cfg.poll_interval = Duration::from_secs(self.poll_interval_secs);
        cfg.poll_deadline = Duration::from_secs(self.poll_deadline_secs);
        cfg.command_timeout = Duration::from_secs(self.command_timeout_secs);
        cfg.settle_delay = Duration::from_millis(self.settle_delay_ms);
        Ok(cfg)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("", "", "ecoiot").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("ecoiot");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Layered sources: defaults, then the TOML file, then `ECOIOT_*` env vars.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ECOIOT_").ignore(&["devices"]))
}

/// Load the config.
///
/// An explicit `path` must exist; the default location may be absent, in
/// which case only defaults and the environment apply.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) if !p.exists() => {
            return Err(ConfigError::NotFound {
                path: p.to_path_buf(),
            });
        }
        Some(p) => p.to_path_buf(),
        None => config_path(),
    };

    let config: Config = figment(&path).extract()?;
    Ok(config)
}
