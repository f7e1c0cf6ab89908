//! `devices`: list what the config file describes.

use serde::Serialize;
use tabled::Tabled;

use ecoiot_core::{CoordinatorConfig, DeviceDescriptor, DeviceModel};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct DeviceView<'a> {
    id: &'a str,
    name: String,
    model: DeviceModel,
    version: Option<&'a str>,
}

impl<'a> From<&'a DeviceDescriptor> for DeviceView<'a> {
    fn from(d: &'a DeviceDescriptor) -> Self {
        Self {
            id: &d.id,
            name: d.display_name(),
            model: d.model,
            version: d.version.as_deref(),
        }
    }
}

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Model")]
    model: String,
    #[tabled(rename = "Firmware")]
    version: String,
}

impl From<&DeviceView<'_>> for DeviceRow {
    fn from(d: &DeviceView<'_>) -> Self {
        Self {
            id: d.id.to_owned(),
            name: d.name.clone(),
            model: d.model.to_string(),
            version: d.version.unwrap_or("-").to_owned(),
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
pub fn handle(config: &CoordinatorConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let views: Vec<DeviceView<'_>> = config.devices.iter().map(DeviceView::from).collect();
    let out = output::render_list(global.output, &views, |v: &DeviceView<'_>| DeviceRow::from(v));
    output::print_output(&out, global.quiet);
    Ok(())
}
