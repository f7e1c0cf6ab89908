//! Command handlers and the views they share.

mod devices;
mod status;
mod switch;
mod watch;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;

use ecoiot_core::{
    CoordinatorConfig, DeviceDescriptor, DeviceModel, DeviceReading, RefreshReport, Snapshot,
    WarningFlag,
};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn dispatch(
    cmd: Command,
    config: CoordinatorConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Devices => devices::handle(&config, global),
        Command::Status(args) => status::handle(config, args, global).await,
        Command::On(args) => switch::handle(config, args, true, global).await,
        Command::Off(args) => switch::handle(config, args, false, global).await,
        Command::Watch => watch::handle(config, global).await,
    }
}

/// Look up a configured device or fail with a not-found error.
fn configured_device(
    config: &CoordinatorConfig,
    id: &str,
) -> Result<DeviceDescriptor, CliError> {
    config
        .device(id)
        .cloned()
        .ok_or_else(|| CliError::NotFound {
            identifier: id.to_owned(),
        })
}

// ── Device status view ──────────────────────────────────────────────

/// One device as of one snapshot.
#[derive(Debug, Serialize)]
struct DeviceStatus {
    id: String,
    name: String,
    model: DeviceModel,
    /// `None` when the device did not answer in that cycle.
    state: Option<bool>,
    /// `None` when unknown; empty when every flag is clear.
    warnings: Option<Vec<WarningFlag>>,
    reading: Option<DeviceReading>,
}

impl DeviceStatus {
    fn new(device: &DeviceDescriptor, snapshot: &Snapshot) -> Self {
        let reading = snapshot.get(&device.id);
        Self {
            id: device.id.clone(),
            name: device.display_name(),
            model: device.model,
            state: reading.and_then(|r| r.is_on(device.model)),
            warnings: WarningFlag::from_reading(device.model, reading.map(|r| &**r)),
            reading: reading.map(|r| (**r).clone()),
        }
    }

    fn warnings_label(&self) -> String {
        match &self.warnings {
            None => "unknown".into(),
            Some(flags) if flags.is_empty() => "-".into(),
            Some(flags) => flags
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Warnings")]
    warnings: String,
}

impl StatusRow {
    fn new(status: &DeviceStatus, color: bool) -> Self {
        let warnings = status.warnings_label();
        let has_warning = status.warnings.as_ref().is_some_and(|w| !w.is_empty());
        Self {
            id: status.id.clone(),
            name: status.name.clone(),
            model: status.model.to_string(),
            state: output::state_label(status.state, color),
            warnings: if has_warning {
                output::warn_label(&warnings, color)
            } else {
                warnings
            },
        }
    }
}

/// Everything `status` and `watch` print for one snapshot.
#[derive(Debug, Serialize)]
struct StatusOutput {
    cycle: u64,
    taken_at: Option<DateTime<Utc>>,
    devices: Vec<DeviceStatus>,
    report: Option<RefreshReport>,
}

impl StatusOutput {
    fn new<'a>(
        devices: impl IntoIterator<Item = &'a DeviceDescriptor>,
        snapshot: &Snapshot,
        report: Option<RefreshReport>,
    ) -> Self {
        Self {
            cycle: snapshot.cycle,
            taken_at: snapshot.taken_at,
            devices: devices
                .into_iter()
                .map(|d| DeviceStatus::new(d, snapshot))
                .collect(),
            // Only the report for this very snapshot belongs with it.
            report: report.filter(|r| r.cycle == snapshot.cycle),
        }
    }

    fn table(&self, color: bool) -> String {
        let rows: Vec<StatusRow> = self
            .devices
            .iter()
            .map(|d| StatusRow::new(d, color))
            .collect();
        let mut lines = vec![output::render_table(&rows)];

        if let Some(report) = &self.report {
            for failure in &report.failures {
                lines.push(output::warn_label(
                    &format!("device {}: {} ({})", failure.device_id, failure.message, failure.kind),
                    color,
                ));
            }
            if let Some(err) = report.degraded() {
                lines.push(output::warn_label(&err.to_string(), color));
            }
        }
        lines.join("\n")
    }
}
