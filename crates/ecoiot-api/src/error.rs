use thiserror::Error;

/// Top-level error type for the `ecoiot-api` crate.
///
/// Every failure of a single request/response exchange maps to exactly one
/// variant, so callers can branch on the kind without string matching.
/// `ecoiot-core` translates these into its domain taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// No complete response within the caller-specified bound.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// HTTP transport error (connection refused, reset, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// URL parsing error while building the device endpoint.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client setup failed: {message}")]
    Http { message: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// A response arrived but could not be decoded at all (bad status,
    /// truncated or syntactically invalid JSON).
    #[error("Protocol error: {message}")]
    Protocol { message: String, body: String },

    /// The response decoded but matched neither the bare acknowledgement
    /// nor the `{"command": [ {...} ]}` shape.
    #[error("Malformed response ({reason}): {raw:?}")]
    MalformedResponse { reason: String, raw: String },

    // ── Encoding ────────────────────────────────────────────────────
    /// The device id cannot be sent as the numeric `id` field.
    #[error("Device id '{id}' is not numeric")]
    InvalidId { id: String },
}

/// Coarse classification of an [`Error`], used for logging and reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Transport,
    Protocol,
    MalformedResponse,
    InvalidId,
}

impl Error {
    /// Classify this error for reporting.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::Transport(e) if e.is_timeout() => FailureKind::Timeout,
            Self::Transport(_) | Self::InvalidUrl(_) | Self::Http { .. } => FailureKind::Transport,
            Self::Protocol { .. } => FailureKind::Protocol,
            Self::MalformedResponse { .. } => FailureKind::MalformedResponse,
            Self::InvalidId { .. } => FailureKind::InvalidId,
        }
    }

    /// Returns `true` if no response arrived in time.
    pub fn is_timeout(&self) -> bool {
        self.kind() == FailureKind::Timeout
    }

    /// Returns `true` if the device could not be reached at all.
    pub fn is_transport(&self) -> bool {
        self.kind() == FailureKind::Transport
    }

    /// Returns `true` if the device answered with something undecodable.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self.kind(),
            FailureKind::Protocol | FailureKind::MalformedResponse
        )
    }

    /// The raw response text, when the failure happened after a response arrived.
    pub fn raw_body(&self) -> Option<&str> {
        match self {
            Self::Protocol { body, .. } => Some(body),
            Self::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }
}
