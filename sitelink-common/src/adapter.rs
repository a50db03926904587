//! Capability traits shared by every device-side component.
//!
//! The bridge only ever talks to `dyn MetricAdapter` and `dyn CommandHandler`;
//! concrete adapters (framed-protocol sessions, SNMP agents) live in their
//! own crates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metric::{Metric, MetricType};

/// A source of normalized metrics.
///
/// Implementations use interior mutability so a single adapter can be shared
/// between the bridge's loops behind an `Arc`. `connect` and `close` must be
/// idempotent.
#[async_trait]
pub trait MetricAdapter: Send + Sync {
    /// Human-readable adapter name used in logs.
    fn name(&self) -> &str;

    async fn connect(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// Collect every metric this adapter knows about.
    async fn collect_metrics(&self) -> Result<Vec<Metric>>;

    /// Collect a single metric, `None` if the source does not provide it.
    async fn collect_metric(&self, metric_type: MetricType) -> Result<Option<Metric>>;
}

/// A command to run on site equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCommand {
    /// Backend command id.
    pub id: i64,

    /// Command verb ("reboot", "set_threshold", ...).
    pub command_type: String,

    #[serde(default)]
    pub params: serde_json::Value,
}

/// Result of running a [`DeviceCommand`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,

    #[serde(default)]
    pub output: String,

    #[serde(default)]
    pub return_code: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandOutcome {
    pub fn succeeded(output: impl Into<String>, return_code: i32) -> Self {
        Self {
            success: true,
            output: output.into(),
            return_code,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            return_code: -1,
            error: Some(error.into()),
        }
    }
}

/// Something that can execute commands on site equipment.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn execute(&self, command: &DeviceCommand) -> Result<CommandOutcome>;
}
