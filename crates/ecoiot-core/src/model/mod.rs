// ── Domain model ──
//
// Device identity comes from `ecoiot-api`; readings and snapshots are the
// core's own types.

pub mod reading;
pub mod warning;

pub use ecoiot_api::{DeviceDescriptor, DeviceModel};
pub use reading::{DeviceReading, Snapshot};
pub use warning::WarningFlag;
