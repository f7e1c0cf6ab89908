//! `on` / `off`: switch one device and show its state afterwards.

use serde::Serialize;

use ecoiot_core::{Controller, CoordinatorConfig};

use crate::cli::{GlobalOpts, SwitchArgs};
use crate::error::CliError;
use crate::output;

use super::{DeviceStatus, configured_device};

#[derive(Serialize)]
struct SwitchOutput {
    device_id: String,
    requested: &'static str,
    acknowledged: bool,
    /// State after the follow-up refresh; absent with `--no-wait`.
    status: Option<DeviceStatus>,
}

pub async fn handle(
    config: CoordinatorConfig,
    args: SwitchArgs,
    on: bool,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let device = configured_device(&config, &args.id)?;
    let settle = config.settle_delay;
    let no_wait = args.no_wait;

    let status = Controller::oneshot(config, |ctrl| {
        let device = device.clone();
        async move {
            ctrl.set_device_state(&device.id, on).await?;
            if no_wait {
                return Ok(None);
            }
            // Same settle delay the controller's own follow-up uses; the two
            // refreshes coalesce into one cycle.
            tokio::time::sleep(settle).await;
            ctrl.refresh().await?;
            Ok(Some(DeviceStatus::new(&device, &ctrl.snapshot())))
        }
    })
    .await?;

    let result = SwitchOutput {
        device_id: device.id.clone(),
        requested: if on { "on" } else { "off" },
        acknowledged: true,
        status,
    };
    let color = output::should_color(global.color);
    let out = output::render_single(global.output, &result, |r| {
        let mut line = format!(
            "{} ({}): {} acknowledged",
            device.display_name(),
            r.device_id,
            r.requested
        );
        if let Some(status) = &r.status {
            line.push_str(&format!(", now {}", output::state_label(status.state, color)));
        }
        line
    });
    output::print_output(&out, global.quiet);
    Ok(())
}
