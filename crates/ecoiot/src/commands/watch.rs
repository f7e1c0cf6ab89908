//! `watch`: keep polling and print each published snapshot.

use chrono::Local;

use ecoiot_core::{Controller, CoordinatorConfig, DeviceDescriptor};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

use super::StatusOutput;

pub async fn handle(config: CoordinatorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let devices = config.devices.clone();
    let controller = Controller::new(config)?;
    controller.connect().await?;

    let color = output::should_color(global.color);
    let mut snapshots = controller.subscribe();
    print_snapshot(&controller, &devices, snapshots.current(), global, color);

    let result = loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                break signal.map_err(|e| CliError::General {
                    message: format!("cannot listen for Ctrl-C: {e}"),
                });
            }
            next = snapshots.changed() => {
                let Some(snapshot) = next else { break Ok(()) };
                print_snapshot(&controller, &devices, &snapshot, global, color);
            }
        }
    };

    controller.disconnect().await;
    result
}

fn print_snapshot(
    controller: &Controller,
    devices: &[DeviceDescriptor],
    snapshot: &ecoiot_core::Snapshot,
    global: &GlobalOpts,
    color: bool,
) {
    let status = StatusOutput::new(devices, snapshot, controller.last_report());
    let out = match global.output {
        OutputFormat::Json => output::render_json_compact(&status),
        OutputFormat::Table => {
            let states = status
                .devices
                .iter()
                .map(|d| format!("{}: {}", d.name, output::state_label(d.state, color)))
                .collect::<Vec<_>>()
                .join("  ");
            let mut line = format!(
                "[{}] cycle {}  {states}",
                Local::now().format("%H:%M:%S"),
                status.cycle
            );
            if let Some(report) = status.report.as_ref().filter(|r| !r.is_clean()) {
                let missing = report.failures.len() + report.abandoned.len();
                line.push_str(&output::warn_label(&format!("  ({missing} unanswered)"), color));
            }
            line
        }
    };
    output::print_output(&out, global.quiet);
}
