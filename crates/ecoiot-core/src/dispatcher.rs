// ── Command dispatch ──
//
// Sends on/off commands to individual devices. A command is a single
// exchange bounded by its own timeout; it never retries. On an
// acknowledgement a follow-up refresh is scheduled after a settle delay so
// the snapshot catches up with the device.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use ecoiot_api::{CommandName, DeviceApi, DeviceDescriptor, Params, QuickRunParams, Reply};

use crate::coordinator::PollCoordinator;
use crate::error::CoreError;

/// Turns devices on and off.
pub struct CommandDispatcher {
    client: Arc<dyn DeviceApi>,
    coordinator: Arc<PollCoordinator>,
    command_timeout: Duration,
    settle_delay: Duration,
    followups: TaskTracker,
    cancel: CancellationToken,
}

impl CommandDispatcher {
    pub fn new(
        client: Arc<dyn DeviceApi>,
        coordinator: Arc<PollCoordinator>,
        command_timeout: Duration,
        settle_delay: Duration,
    ) -> Self {
        Self {
            client,
            coordinator,
            command_timeout,
            settle_delay,
            followups: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Switch `device_id` on (`quick_run`, always-on) or off (`quick_stop`).
    ///
    /// Returns once the device has acknowledged. The snapshot is not
    /// touched here; it reflects the new state after the follow-up refresh.
    ///
    /// Only the bare acknowledgement counts as success. A JSON body or any
    /// other readable text is [`CoreError::CommandRejected`] carrying the
    /// reply. A reply that cannot be decoded at all (truncated JSON, HTTP
    /// error status) is [`CoreError::CommandFailed`] with the protocol
    /// error as its source, as are timeouts and transport failures.
    pub async fn set_state(&self, device_id: &str, on: bool) -> Result<(), CoreError> {
        let device = self.device(device_id)?;
        let (command, params) = if on {
            (CommandName::QuickRun, QuickRunParams::ALWAYS_ON.into_params())
        } else {
            (CommandName::QuickStop, Params::new())
        };

        debug!(device_id, %command, "sending command");
        let reply = self
            .client
            .request(device, command, &params, self.command_timeout)
            .await
            .map_err(|e| command_error(device, e))?;

        if let Reply::Body(fields) = reply {
            let reply = Value::Object(fields).to_string();
            warn!(device_id, %command, %reply, "device did not acknowledge command");
            return Err(CoreError::CommandRejected {
                device_id: device.id.clone(),
                reply,
            });
        }

        info!(device_id, on, "command acknowledged");
        self.schedule_refresh();
        Ok(())
    }

    /// Wait for scheduled follow-up refreshes, or drop them if `cancel` is set.
    pub async fn shutdown(&self, cancel: bool) {
        if cancel {
            self.cancel.cancel();
        }
        self.followups.close();
        self.followups.wait().await;
    }

    /// Follow-up refreshes not yet finished.
    pub fn pending_followups(&self) -> usize {
        self.followups.len()
    }

    fn device(&self, device_id: &str) -> Result<&DeviceDescriptor, CoreError> {
        self.coordinator
            .devices()
            .iter()
            .find(|d| d.id == device_id)
            .ok_or_else(|| CoreError::UnknownDevice {
                id: device_id.to_owned(),
            })
    }

    fn schedule_refresh(&self) {
        let coordinator = Arc::clone(&self.coordinator);
        let cancel = self.cancel.clone();
        let delay = self.settle_delay;

        self.followups.spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    match coordinator.refresh().await {
                        Ok(report) => debug!(cycle = report.cycle, "follow-up refresh complete"),
                        Err(e) => warn!(error = %e, "follow-up refresh failed"),
                    }
                }
            }
        });
    }
}

/// Map an exchange failure on the command path.
///
/// Text that decoded to neither an acknowledgement nor JSON counts as the
/// device's answer, so it is a rejection rather than a transport failure.
fn command_error(device: &DeviceDescriptor, err: ecoiot_api::Error) -> CoreError {
    match err {
        ecoiot_api::Error::InvalidId { id } => CoreError::InvalidId { id },
        ecoiot_api::Error::MalformedResponse { raw, .. } => CoreError::CommandRejected {
            device_id: device.id.clone(),
            reply: raw,
        },
        source => CoreError::CommandFailed {
            device_id: device.id.clone(),
            source,
        },
    }
}
