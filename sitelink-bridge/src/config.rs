use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use sitelink_cloud::CloudConfig;
use sitelink_common::LoggingConfig;
use sitelink_device::DeviceSessionConfig;
use sitelink_snmp::SnmpAdapterConfig;

use crate::error::{BridgeError, Result};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Identity of the site this gateway serves.
    pub station: StationConfig,

    /// Management backend.
    pub cloud: CloudConfig,

    /// Site controller speaking the framed protocol.
    #[serde(default)]
    pub device: Option<DeviceSessionConfig>,

    /// SNMP agents to poll.
    #[serde(default)]
    pub snmp: Vec<SnmpAdapterConfig>,

    /// Loop periods.
    #[serde(default)]
    pub intervals: IntervalsConfig,

    /// How long `stop` waits for the loops before closing devices.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

/// Station identity and registration metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationConfig {
    /// Station id used for backend calls until the record id is known.
    pub id: String,

    /// Name the station is registered and looked up under (default: `id`).
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub latitude: Option<f64>,

    #[serde(default)]
    pub longitude: Option<f64>,

    #[serde(default)]
    pub description: Option<String>,
}

impl StationConfig {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Registration name, falling back to the station id.
    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.id)
    }
}

/// Loop periods in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntervalsConfig {
    /// Metrics collection and upload period.
    #[serde(default = "default_metrics_secs")]
    pub metrics_secs: u64,

    /// Pending-command poll period.
    #[serde(default = "default_commands_secs")]
    pub commands_secs: u64,
}

fn default_metrics_secs() -> u64 {
    60
}

fn default_commands_secs() -> u64 {
    30
}

impl Default for IntervalsConfig {
    fn default() -> Self {
        Self {
            metrics_secs: default_metrics_secs(),
            commands_secs: default_commands_secs(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a JSON5 file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        sitelink_common::load_config(path).map_err(|e| BridgeError::config(e.to_string()))
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self> {
        sitelink_common::parse_config(content).map_err(|e| BridgeError::config(e.to_string()))
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.intervals.metrics_secs)
    }

    pub fn commands_interval(&self) -> Duration {
        Duration::from_secs(self.intervals.commands_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Check everything that would otherwise fail at startup.
    pub fn validate(&self) -> Result<()> {
        if self.station.id.trim().is_empty() {
            return Err(BridgeError::validation("Station id cannot be empty"));
        }

        self.cloud.validate()?;

        if let Some(device) = &self.device {
            device.validate()?;
        }

        let mut names = HashSet::new();
        if let Some(device) = &self.device {
            names.insert(device.name.as_str());
        }
        for adapter in &self.snmp {
            adapter.validate()?;
            if !names.insert(adapter.name.as_str()) {
                return Err(BridgeError::validation(format!(
                    "Duplicate adapter name '{}'",
                    adapter.name
                )));
            }
        }

        if self.device.is_none() && self.snmp.is_empty() {
            return Err(BridgeError::validation(
                "At least one device or SNMP adapter is required",
            ));
        }

        if self.intervals.metrics_secs == 0 || self.intervals.commands_secs == 0 {
            return Err(BridgeError::validation(
                "Loop intervals must be greater than zero",
            ));
        }

        Ok(())
    }
}
