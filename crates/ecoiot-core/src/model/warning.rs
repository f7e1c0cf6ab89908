// ── Warning bitfield decoding ──
//
// Read-side metadata for the presentation layer. The coordinator never
// interprets these bits.

use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator};

use ecoiot_api::DeviceModel;

use super::reading::DeviceReading;

/// A named condition reported through a device's `warning` bitfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "title_case")]
pub enum WarningFlag {
    // AC1100
    LeakCurrent,
    NoLoad,
    LowCurrent,
    Overload,
    RelayAbnormal,
    // WFC01
    WaterLeak,
    NoWater,
    TemperatureLow,
    TemperatureHigh,
    LowBattery,
    // Both
    Offline,
}

impl WarningFlag {
    /// Bit position of this flag for `model`, or `None` if the model does
    /// not report it.
    pub fn bit(self, model: DeviceModel) -> Option<u32> {
        match (model, self) {
            (DeviceModel::Ac1100, Self::LeakCurrent) | (DeviceModel::Wfc01, Self::WaterLeak) => {
                Some(0)
            }
            (DeviceModel::Ac1100, Self::NoLoad) | (DeviceModel::Wfc01, Self::NoWater) => Some(1),
            (DeviceModel::Ac1100, Self::LowCurrent) | (DeviceModel::Wfc01, Self::TemperatureLow) => {
                Some(2)
            }
            (DeviceModel::Ac1100, Self::Overload) | (DeviceModel::Wfc01, Self::TemperatureHigh) => {
                Some(3)
            }
            (DeviceModel::Ac1100, Self::RelayAbnormal) | (DeviceModel::Wfc01, Self::LowBattery) => {
                Some(4)
            }
            (_, Self::Offline) => Some(7),
            _ => None,
        }
    }

    /// Every flag `model` can report, in bit order.
    pub fn for_model(model: DeviceModel) -> Vec<Self> {
        let mut flags: Vec<Self> = Self::iter().filter(|f| f.bit(model).is_some()).collect();
        flags.sort_by_key(|f| f.bit(model));
        flags
    }

    /// Flags set in `warning` for `model`.
    pub fn decode(model: DeviceModel, warning: u64) -> Vec<Self> {
        Self::for_model(model)
            .into_iter()
            .filter(|f| f.bit(model).is_some_and(|bit| warning & (1 << bit) != 0))
            .collect()
    }

    /// Active flags for a reading, or `None` when the state is unknown
    /// (no reading, or no `warning` field).
    pub fn from_reading(model: DeviceModel, reading: Option<&DeviceReading>) -> Option<Vec<Self>> {
        reading
            .and_then(DeviceReading::warning)
            .map(|w| Self::decode(model, w))
    }
}
