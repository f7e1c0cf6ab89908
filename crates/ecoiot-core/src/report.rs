// ── Refresh cycle reporting ──
//
// What a poll cycle did, per device. Reports are diagnostics: the snapshot
// remains the only source of device state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use ecoiot_api::FailureKind;

use crate::error::CoreError;

/// Where the coordinator is within a poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(tag = "phase", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefreshPhase {
    Idle,
    Polling { cycle: u64 },
    Aggregating { cycle: u64 },
    Published { cycle: u64 },
}

/// A device that answered, but not with a reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceFailure {
    pub device_id: String,
    pub kind: FailureKind,
    pub message: String,
}

impl DeviceFailure {
    pub fn new(device_id: impl Into<String>, error: &ecoiot_api::Error) -> Self {
        Self {
            device_id: device_id.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Outcome of one poll cycle.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    #[serde(with = "millis")]
    pub elapsed: Duration,
    /// Devices whose reading made it into the snapshot.
    pub readings: Vec<String>,
    /// Devices that answered a read with a bare acknowledgement.
    pub no_data: Vec<String>,
    /// Devices whose exchange failed before the deadline.
    pub failures: Vec<DeviceFailure>,
    /// Devices still outstanding when the cycle deadline expired.
    pub abandoned: Vec<String>,
    /// Whether the store accepted this cycle's snapshot.
    pub published: bool,
}

impl RefreshReport {
    pub(crate) fn new(cycle: u64, started_at: DateTime<Utc>) -> Self {
        Self {
            cycle,
            started_at,
            elapsed: Duration::ZERO,
            readings: Vec::new(),
            no_data: Vec::new(),
            failures: Vec::new(),
            abandoned: Vec::new(),
            published: false,
        }
    }

    /// `true` if the cycle deadline cut polling short.
    pub fn is_degraded(&self) -> bool {
        !self.abandoned.is_empty()
    }

    /// The cycle-level error for a deadline overrun, if there was one.
    pub fn degraded(&self) -> Option<CoreError> {
        self.is_degraded().then(|| CoreError::DegradedRefresh {
            cycle: self.cycle,
            abandoned: self.abandoned.clone(),
        })
    }

    /// `true` if every device polled cleanly.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.abandoned.is_empty()
    }

    /// `true` if nothing answered and every failure points at the network
    /// rather than at a device: the gateway itself looks unreachable.
    pub fn gateway_unreachable(&self) -> bool {
        if !self.readings.is_empty() || !self.no_data.is_empty() {
            return false;
        }
        if self.is_degraded() {
            return true;
        }
        !self.failures.is_empty()
            && self
                .failures
                .iter()
                .all(|f| matches!(f.kind, FailureKind::Timeout | FailureKind::Transport))
    }

    /// The failure recorded for `device_id` in this cycle, if any.
    pub fn failure(&self, device_id: &str) -> Option<&DeviceFailure> {
        self.failures.iter().find(|f| f.device_id == device_id)
    }
}

mod millis {
    use std::time::Duration;

    use serde::Serializer;

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }
}
