// ── Readings and snapshots ──

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ecoiot_api::DeviceModel;

/// Decoded state of one device from one successful poll.
///
/// The field set depends on the model and firmware; every field of the
/// reply's `command[0]` object is kept, including ones this crate does not
/// know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceReading {
    fields: Map<String, Value>,
}

impl DeviceReading {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Numeric field value. Firmware sends some numbers as strings
    /// (`"12.5"`), so both forms are accepted.
    pub fn number(&self, field: &str) -> Option<f64> {
        match self.fields.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Integer field value, accepting the same encodings as [`number`](Self::number).
    pub fn integer(&self, field: &str) -> Option<u64> {
        match self.fields.get(field)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// The `warning` bitfield, if reported.
    pub fn warning(&self) -> Option<u64> {
        self.integer("warning")
    }

    /// On/off status for the given model (`ac_status` / `water_status`).
    pub fn is_on(&self, model: DeviceModel) -> Option<bool> {
        self.integer(model.status_field()).map(|v| v != 0)
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }
}

impl From<Map<String, Value>> for DeviceReading {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// The coordinator's aggregated view of every device, published once per
/// poll cycle.
///
/// A device is present only if it answered with a reading during the cycle
/// that produced this snapshot. Absence means "unknown", never "off".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Monotonic cycle id. Zero is the empty snapshot present before the
    /// first refresh.
    pub cycle: u64,
    /// When the cycle that produced this snapshot started.
    pub taken_at: Option<DateTime<Utc>>,
    pub readings: BTreeMap<String, Arc<DeviceReading>>,
}

impl Snapshot {
    /// The snapshot in place before any refresh has completed.
    pub fn empty() -> Self {
        Self {
            cycle: 0,
            taken_at: None,
            readings: BTreeMap::new(),
        }
    }

    pub fn get(&self, device_id: &str) -> Option<&Arc<DeviceReading>> {
        self.readings.get(device_id)
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.readings.contains_key(device_id)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn reading(value: Value) -> DeviceReading {
        match value {
            Value::Object(map) => DeviceReading::new(map),
            _ => DeviceReading::new(Map::new()),
        }
    }

    #[test]
    fn numbers_accept_string_encoding() {
        let r = reading(json!({"realtime_power": "12.5", "flow_velocity": 3, "label": "x"}));
        assert_eq!(r.number("realtime_power"), Some(12.5));
        assert_eq!(r.number("flow_velocity"), Some(3.0));
        assert_eq!(r.number("label"), None);
        assert_eq!(r.number("missing"), None);
    }

    #[test]
    fn status_field_depends_on_model() {
        let plug = reading(json!({"ac_status": 1, "warning": "0"}));
        assert_eq!(plug.is_on(DeviceModel::Ac1100), Some(true));
        assert_eq!(plug.is_on(DeviceModel::Wfc01), None);
        assert_eq!(plug.warning(), Some(0));

        let valve = reading(json!({"water_status": 0}));
        assert_eq!(valve.is_on(DeviceModel::Wfc01), Some(false));
    }

    #[test]
    fn reading_serializes_as_plain_object() {
        let r = reading(json!({"id": 7, "future": [1, 2]}));
        let out = serde_json::to_value(&r).ok();
        assert_eq!(out, Some(json!({"id": 7, "future": [1, 2]})));
    }

    #[test]
    fn empty_snapshot_has_cycle_zero() {
        let snap = Snapshot::default();
        assert_eq!(snap.cycle, 0);
        assert!(snap.is_empty());
        assert!(!snap.contains("1"));
    }
}
