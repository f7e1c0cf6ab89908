// ── Core error types ──
//
// Domain errors from ecoiot-core. Every failure path of a poll or command
// maps to exactly one variant. The `From<ecoiot_api::Error>` impl translates
// transport-layer errors into this taxonomy.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Exchange errors ──────────────────────────────────────────────
    #[error("Device did not answer within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Cannot reach gateway: {reason}")]
    Transport { reason: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Malformed response ({reason}): {raw:?}")]
    MalformedResponse { reason: String, raw: String },

    #[error("Device id '{id}' is not numeric")]
    InvalidId { id: String },

    // ── Command errors ───────────────────────────────────────────────
    #[error("Unknown device: {id}")]
    UnknownDevice { id: String },

    #[error("Device {device_id} rejected the command: {reply}")]
    CommandRejected { device_id: String, reply: String },

    #[error("Command to device {device_id} failed: {source}")]
    CommandFailed {
        device_id: String,
        #[source]
        source: ecoiot_api::Error,
    },

    // ── Refresh errors ───────────────────────────────────────────────
    #[error(
        "Refresh cycle {cycle} hit its deadline; {} device(s) not polled: {}",
        .abandoned.len(),
        .abandoned.join(", ")
    )]
    DegradedRefresh { cycle: u64, abandoned: Vec<String> },

    #[error("Not ready: initial refresh against {host} failed: {reason}")]
    NotReady { host: String, reason: String },

    #[error("Coordinator is not running")]
    Disconnected,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ecoiot_api::Error> for CoreError {
    fn from(err: ecoiot_api::Error) -> Self {
        match err {
            ecoiot_api::Error::Timeout { timeout_ms } => CoreError::Timeout { timeout_ms },
            ecoiot_api::Error::Transport(ref e) if e.is_timeout() => {
                CoreError::Timeout { timeout_ms: 0 }
            }
            ecoiot_api::Error::Transport(e) => CoreError::Transport {
                reason: e.to_string(),
            },
            ecoiot_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid gateway URL: {e}"),
            },
            ecoiot_api::Error::Http { message } => CoreError::Transport { reason: message },
            ecoiot_api::Error::Protocol { message, body: _ } => CoreError::Protocol { message },
            ecoiot_api::Error::MalformedResponse { reason, raw } => {
                CoreError::MalformedResponse { reason, raw }
            }
            ecoiot_api::Error::InvalidId { id } => CoreError::InvalidId { id },
        }
    }
}

impl CoreError {
    /// Returns `true` for errors the caller cannot fix by retrying with the
    /// same input.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::InvalidId { .. } | Self::UnknownDevice { .. } | Self::Config { .. }
        )
    }
}
