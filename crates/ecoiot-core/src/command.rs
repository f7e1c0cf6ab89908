// ── Command API ──
//
// Writes and on-demand refreshes flow through one `Command` enum. The
// controller's command processor routes each variant to the dispatcher or
// the poll coordinator and answers on a oneshot channel.

use serde::Serialize;

use crate::error::CoreError;
use crate::report::RefreshReport;

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// Switch one device on or off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandRequest {
    pub device_id: String,
    pub on: bool,
}

impl CommandRequest {
    pub fn on(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            on: true,
        }
    }

    pub fn off(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            on: false,
        }
    }
}

/// All operations a consumer can request from a running controller.
#[derive(Debug, Clone)]
pub enum Command {
    /// `quick_run` / `quick_stop` against one device.
    SetState(CommandRequest),
    /// Out-of-schedule poll of every device.
    Refresh,
}

/// Result of a command execution.
#[derive(Debug)]
pub enum CommandResult {
    /// The device acknowledged; a follow-up refresh has been scheduled.
    Accepted,
    /// The refresh completed (possibly joining one already in flight).
    Refreshed(RefreshReport),
}
