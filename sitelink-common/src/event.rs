//! Events pushed asynchronously by devices.
//!
//! Sessions deliver these over a channel; the bridge consumes them in its
//! own loop instead of registering callbacks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metric::{Metric, MetricType};

/// Something a device reported without being asked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// Periodic metrics push.
    Metrics { metrics: Vec<Metric> },
    /// Status change reported by the controller.
    Status(DeviceStatusReport),
    /// Alarm raised by the device.
    Alert(AlertEvent),
}

/// Device status as reported by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatusReport {
    /// Operational state ("online", "maintenance", "fault", ...).
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,
}

/// What triggered an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ThresholdExceeded,
    StateChange,
    Error,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::ThresholdExceeded => "threshold_exceeded",
            AlertKind::StateChange => "state_change",
            AlertKind::Error => "error",
        }
    }
}

/// Alert severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    #[default]
    Warning,
    Critical,
}

impl AlertSeverity {
    /// Severity name in the backend's vocabulary.
    pub fn as_cloud_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "INFO",
            AlertSeverity::Warning => "WARNING",
            AlertSeverity::Critical => "CRITICAL",
        }
    }
}

/// Alert raised by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,

    #[serde(default)]
    pub severity: AlertSeverity,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<MetricType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl AlertEvent {
    pub fn new(kind: AlertKind, severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
            metric_type: None,
            value: None,
            threshold: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the offending reading to a threshold alert.
    pub fn with_reading(mut self, metric_type: MetricType, value: f32, threshold: f32) -> Self {
        self.metric_type = Some(metric_type);
        self.value = Some(value);
        self.threshold = Some(threshold);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_defaults_from_json() {
        let alert: AlertEvent =
            serde_json::from_str(r#"{"kind":"state_change","message":"door opened"}"#).unwrap();
        assert_eq!(alert.kind, AlertKind::StateChange);
        assert_eq!(alert.severity, AlertSeverity::Warning);
        assert!(alert.metric_type.is_none());
    }

    #[test]
    fn test_threshold_alert() {
        let alert = AlertEvent::new(
            AlertKind::ThresholdExceeded,
            AlertSeverity::Critical,
            "cabinet too hot",
        )
        .with_reading(MetricType::Temperature, 48.5, 45.0);

        assert_eq!(alert.metric_type, Some(MetricType::Temperature));
        assert_eq!(alert.severity.as_cloud_str(), "CRITICAL");
    }

    #[test]
    fn test_event_tagging() {
        let event = DeviceEvent::Metrics {
            metrics: vec![Metric::new(MetricType::Humidity, 40.0)],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "metrics");
        assert_eq!(json["metrics"][0]["type"], "humidity");
    }
}
