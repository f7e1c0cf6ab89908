//! `status`: poll once and print every device's state.

use ecoiot_core::{Controller, CoordinatorConfig};

use crate::cli::{GlobalOpts, StatusArgs};
use crate::error::CliError;
use crate::output;

use super::{StatusOutput, configured_device};

pub async fn handle(
    config: CoordinatorConfig,
    args: StatusArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let devices = match &args.id {
        Some(id) => vec![configured_device(&config, id)?],
        None => config.devices.clone(),
    };

    let (snapshot, report) =
        Controller::oneshot(config, |ctrl| async move { Ok((ctrl.snapshot(), ctrl.last_report())) })
            .await?;

    let status = StatusOutput::new(&devices, &snapshot, report);
    let color = output::should_color(global.color);
    let out = output::render_single(global.output, &status, |s| s.table(color));
    output::print_output(&out, global.quiet);
    Ok(())
}
