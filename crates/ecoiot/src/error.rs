//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use ecoiot_config::ConfigError;
use ecoiot_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const REJECTED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the gateway at {host}")]
    #[diagnostic(
        code(ecoiot::connection_failed),
        help(
            "Check that the gateway is powered and on the same network.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { host: String, reason: String },

    #[error("Timed out: {detail}")]
    #[diagnostic(
        code(ecoiot::timeout),
        help("Raise poll_deadline_secs / command_timeout_secs in the config, or check the gateway.")
    )]
    Timeout { detail: String },

    // ── Devices ──────────────────────────────────────────────────────
    #[error("Device '{identifier}' is not configured")]
    #[diagnostic(
        code(ecoiot::not_found),
        help("Run: ecoiot devices to see configured devices")
    )]
    NotFound { identifier: String },

    #[error("Device {device_id} rejected the command")]
    #[diagnostic(code(ecoiot::rejected), help("Device replied: {reply}"))]
    Rejected { device_id: String, reply: String },

    #[error("Device {device_id} answered with something unreadable: {message}")]
    #[diagnostic(code(ecoiot::protocol))]
    Protocol { device_id: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(ecoiot::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("No gateway configured")]
    #[diagnostic(
        code(ecoiot::no_config),
        help(
            "Create a config file at {path}\n\
             or pass the gateway address with --host."
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(ecoiot::config))]
    Config(Box<figment::Error>),

    #[error("Config file not found: {path}")]
    #[diagnostic(code(ecoiot::config_not_found))]
    ConfigNotFound { path: String },

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(ecoiot::general))]
    General { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::ConfigNotFound { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NotFound { path } => Self::ConfigNotFound {
                path: path.display().to_string(),
            },
            ConfigError::Figment(e) => Self::Config(e),
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotReady { host, reason } => Self::ConnectionFailed { host, reason },

            CoreError::Transport { reason } => Self::ConnectionFailed {
                host: "(gateway)".into(),
                reason,
            },

            CoreError::Disconnected => Self::ConnectionFailed {
                host: "(gateway)".into(),
                reason: "coordinator is not running".into(),
            },

            e @ (CoreError::Timeout { .. } | CoreError::DegradedRefresh { .. }) => {
                Self::Timeout {
                    detail: e.to_string(),
                }
            }

            CoreError::UnknownDevice { id } => Self::NotFound { identifier: id },

            CoreError::InvalidId { id } => Self::Validation {
                field: "device id".into(),
                reason: format!("'{id}' is not numeric"),
            },

            CoreError::CommandRejected { device_id, reply } => Self::Rejected { device_id, reply },

            CoreError::CommandFailed { device_id, source } => {
                if source.is_timeout() {
                    Self::Timeout {
                        detail: format!("device {device_id}: {source}"),
                    }
                } else if source.is_protocol() {
                    Self::Protocol {
                        device_id,
                        message: source.to_string(),
                    }
                } else {
                    Self::ConnectionFailed {
                        host: format!("(device {device_id})"),
                        reason: source.to_string(),
                    }
                }
            }

            CoreError::Protocol { message } => Self::Protocol {
                device_id: "(unknown)".into(),
                message,
            },

            CoreError::MalformedResponse { reason, raw } => Self::Protocol {
                device_id: "(unknown)".into(),
                message: format!("{reason}: {raw:?}"),
            },

            CoreError::Config { message } => Self::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_class() {
        let cases: Vec<(CoreError, i32)> = vec![
            (
                CoreError::NotReady {
                    host: "h".into(),
                    reason: "r".into(),
                },
                exit_code::CONNECTION,
            ),
            (
                CoreError::UnknownDevice { id: "9".into() },
                exit_code::NOT_FOUND,
            ),
            (
                CoreError::CommandRejected {
                    device_id: "1".into(),
                    reply: "{}".into(),
                },
                exit_code::REJECTED,
            ),
            (
                CoreError::CommandFailed {
                    device_id: "1".into(),
                    source: ecoiot_api::Error::Timeout { timeout_ms: 5 },
                },
                exit_code::TIMEOUT,
            ),
            (
                CoreError::InvalidId { id: "x".into() },
                exit_code::USAGE,
            ),
        ];
        for (err, code) in cases {
            let cli = CliError::from(err);
            assert_eq!(cli.exit_code(), code, "{cli}");
        }
    }
}
