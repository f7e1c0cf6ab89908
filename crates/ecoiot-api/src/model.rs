// Device identity as seen on the wire.
//
// Descriptors are built once from configuration and never mutated. The
// wire codec only needs the id and the model; display metadata rides along
// for the presentation layer.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Hardware model reported in every command's `model` field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum DeviceModel {
    /// Smart plug / power controller.
    #[serde(rename = "AC1100")]
    #[strum(serialize = "AC1100", ascii_case_insensitive)]
    Ac1100,
    /// Smart water timer / valve controller.
    #[serde(rename = "WFC01")]
    #[strum(serialize = "WFC01", ascii_case_insensitive)]
    Wfc01,
}

impl DeviceModel {
    /// Name of the field carrying the on/off status in a `read_device` reply.
    pub fn status_field(self) -> &'static str {
        match self {
            Self::Ac1100 => "ac_status",
            Self::Wfc01 => "water_status",
        }
    }
}

/// Immutable identity of one configured device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Device id, unique within the deployment. Stored as text, sent as a number.
    pub id: String,
    pub model: DeviceModel,
    /// Optional display name (the device's nickname).
    pub name: Option<String>,
    /// Optional firmware version string.
    pub version: Option<String>,
}

impl DeviceDescriptor {
    pub fn new(id: impl Into<String>, model: DeviceModel) -> Self {
        Self {
            id: id.into(),
            model,
            name: None,
            version: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Nickname if configured, otherwise `"<MODEL> <id>"`.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.model, self.id))
    }

    /// The id as the numeric value the wire protocol requires.
    pub fn numeric_id(&self) -> Result<u64, crate::Error> {
        self.id
            .trim()
            .parse::<u64>()
            .map_err(|_| crate::Error::InvalidId {
                id: self.id.clone(),
            })
    }
}
