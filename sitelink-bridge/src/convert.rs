//! Translation from the gateway's metric and event model to backend DTOs.

use chrono::Utc;

use sitelink_cloud::{AlertRequest, CloudMetric, StatusUpdate};
use sitelink_common::{AlertEvent, DeviceStatusReport, Metric, MetricType};

/// Backend name for a metric type, `None` when the backend has no equivalent.
pub fn cloud_metric_type(metric_type: MetricType) -> Option<&'static str> {
    let name = match metric_type {
        MetricType::Temperature => "TEMPERATURE",
        MetricType::Humidity => "HUMIDITY",
        MetricType::BatteryVoltage => "BATTERY_VOLTAGE",
        MetricType::BatteryCurrent => "BATTERY_CURRENT",
        MetricType::BatteryCapacity => "BATTERY_LEVEL",
        MetricType::BatteryTemperature => "BATTERY_TEMPERATURE",
        MetricType::BatteryRuntime => "BATTERY_RUNTIME",
        MetricType::InputVoltage => "INPUT_VOLTAGE",
        MetricType::InputFrequency => "INPUT_FREQUENCY",
        MetricType::OutputVoltage => "OUTPUT_VOLTAGE",
        MetricType::OutputCurrent => "OUTPUT_CURRENT",
        MetricType::OutputFrequency => "OUTPUT_FREQUENCY",
        MetricType::OutputLoad => "LOAD_PERCENT",
        MetricType::OutputPower => "OUTPUT_POWER",
        MetricType::PowerConsumption => "POWER_CONSUMPTION",
        MetricType::Energy => "ENERGY",
        MetricType::DcVoltage => "DC_VOLTAGE",
        MetricType::DcCurrent => "DC_CURRENT",
        MetricType::FanSpeed => "FAN_SPEED",
        MetricType::DoorOpen => "DOOR_STATUS",
        MetricType::SmokeDetected => "SMOKE_ALARM",
        MetricType::WaterLeak => "WATER_LEAK",
        MetricType::CpuUsage => "CPU_USAGE",
        MetricType::MemoryUsage => "MEMORY_USAGE",
        MetricType::RfOutputPower => "RF_POWER",
        MetricType::Vswr => "VSWR",
        MetricType::SignalStrength => "SIGNAL_STRENGTH",
        MetricType::FiberRxPower => "FIBER_RX_POWER",
        MetricType::FiberTxPower => "FIBER_TX_POWER",
        MetricType::Uptime | MetricType::InterfaceInOctets | MetricType::InterfaceOutOctets => {
            return None;
        }
    };
    Some(name)
}

/// Convert a metric, `None` when its type has no backend name.
pub fn to_cloud_metric(metric: &Metric) -> Option<CloudMetric> {
    let name = cloud_metric_type(metric.metric_type)?;
    let cloud = CloudMetric::new(name, metric.value);
    let unit = metric.metric_type.unit();
    Some(if unit.is_empty() {
        cloud
    } else {
        cloud.with_unit(unit)
    })
}

/// Convert a batch, dropping metrics the backend cannot represent.
pub fn to_cloud_metrics(metrics: &[Metric]) -> Vec<CloudMetric> {
    let converted: Vec<CloudMetric> = metrics.iter().filter_map(to_cloud_metric).collect();

    let dropped = metrics.len() - converted.len();
    if dropped > 0 {
        tracing::debug!(dropped, kept = converted.len(), "Skipped metrics without a backend type");
    }

    converted
}

pub fn to_alert_request(station_id: &str, alert: &AlertEvent) -> AlertRequest {
    AlertRequest {
        station_id: station_id.to_string(),
        alert_type: alert.kind.as_str().to_ascii_uppercase(),
        severity: alert.severity.as_cloud_str().to_string(),
        message: alert.message.clone(),
        metric_type: alert
            .metric_type
            .and_then(cloud_metric_type)
            .map(str::to_string),
        value: alert.value,
        threshold: alert.threshold,
        timestamp: alert.timestamp,
    }
}

pub fn to_status_update(report: &DeviceStatusReport) -> StatusUpdate {
    StatusUpdate {
        status: report.status.to_ascii_uppercase(),
        message: report.message.clone(),
        firmware_version: report.firmware_version.clone(),
        uptime_secs: report.uptime_secs,
        timestamp: Utc::now(),
    }
}
