// ecoiot-core: polling coordinator and command dispatch between ecoiot-api and consumers (CLI).

pub mod command;
pub mod config;
pub mod controller;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod model;
pub mod report;
pub mod store;
pub mod stream;

#[cfg(test)]
mod fake;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandRequest, CommandResult};
pub use config::CoordinatorConfig;
pub use controller::{ConnectionState, Controller};
pub use coordinator::PollCoordinator;
pub use dispatcher::CommandDispatcher;
pub use error::CoreError;
pub use report::{DeviceFailure, RefreshPhase, RefreshReport};
pub use store::StateStore;
pub use stream::{SnapshotStream, SnapshotWatchStream};

// Re-export model types at the crate root for ergonomics.
pub use model::{DeviceDescriptor, DeviceModel, DeviceReading, Snapshot, WarningFlag};
