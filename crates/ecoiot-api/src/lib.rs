// ecoiot-api: wire codec and async client for the Ecowitt IoT quick-command protocol

pub mod client;
pub mod codec;
pub mod error;
pub mod model;
pub mod transport;

pub use client::{DeviceApi, DeviceClient};
pub use codec::{CommandName, Params, QuickRunParams, Reply};
pub use error::{Error, FailureKind};
pub use model::{DeviceDescriptor, DeviceModel};
pub use transport::TransportConfig;
