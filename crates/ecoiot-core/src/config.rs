// ── Runtime coordinator configuration ──
//
// These types describe *what* to poll and *how often*. They never touch
// disk: the CLI (or any other host) builds a `CoordinatorConfig` and hands
// it in.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::CoreError;
use crate::model::DeviceDescriptor;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_DEADLINE: Duration = Duration::from_secs(10);
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Configuration for one gateway and the devices behind it.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Gateway address (`192.168.1.50`, `gw.local:8080`, or a full `http://` URL).
    pub host: String,
    /// Devices to poll, in configuration order.
    pub devices: Vec<DeviceDescriptor>,
    /// How often the scheduled refresh runs. Zero disables the schedule.
    pub poll_interval: Duration,
    /// One deadline covering every device in a poll cycle.
    pub poll_deadline: Duration,
    /// Bound on a single on/off command exchange.
    pub command_timeout: Duration,
    /// Wait between a command acknowledgement and the follow-up refresh.
    pub settle_delay: Duration,
}

impl CoordinatorConfig {
    pub fn new(host: impl Into<String>, devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            host: host.into(),
            devices,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_deadline: DEFAULT_POLL_DEADLINE,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Check invariants the coordinator relies on.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.host.trim().is_empty() {
            return Err(CoreError::Config {
                message: "gateway host is empty".into(),
            });
        }
        if self.poll_deadline.is_zero() {
            return Err(CoreError::Config {
                message: "poll deadline must be greater than zero".into(),
            });
        }

        let mut seen = HashSet::new();
        for device in &self.devices {
            // Numeric ids compare by wire value, so "010" collides with "10".
            let key = device
                .numeric_id()
                .map_or_else(|_| device.id.clone(), |n| n.to_string());
            if !seen.insert(key) {
                return Err(CoreError::Config {
                    message: format!("duplicate device id '{}'", device.id),
                });
            }
        }
        Ok(())
    }

    /// Look up a configured device by id.
    pub fn device(&self, id: &str) -> Option<&DeviceDescriptor> {
        self.devices.iter().find(|d| d.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceModel;

    #[test]
    fn defaults_match_protocol_timings() {
        let cfg = CoordinatorConfig::new("10.0.0.2", Vec::new());
        assert_eq!(cfg.poll_interval, Duration::from_secs(30));
        assert_eq!(cfg.poll_deadline, Duration::from_secs(10));
        assert_eq!(cfg.settle_delay, Duration::from_secs(1));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let cfg = CoordinatorConfig::new(
            "10.0.0.2",
            vec![
                DeviceDescriptor::new("1", DeviceModel::Ac1100),
                DeviceDescriptor::new("1", DeviceModel::Wfc01),
            ],
        );
        assert!(matches!(cfg.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn ids_with_the_same_wire_value_are_duplicates() {
        let cfg = CoordinatorConfig::new(
            "10.0.0.2",
            vec![
                DeviceDescriptor::new("010", DeviceModel::Ac1100),
                DeviceDescriptor::new("10", DeviceModel::Ac1100),
            ],
        );
        assert!(matches!(cfg.validate(), Err(CoreError::Config { .. })));
    }

    #[test]
    fn empty_host_is_rejected() {
        let cfg = CoordinatorConfig::new("  ", Vec::new());
        assert!(cfg.validate().is_err());
    }
}
