use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// A single normalized measurement produced by an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// What was measured.
    #[serde(rename = "type")]
    pub metric_type: MetricType,

    /// The measured value, already scaled.
    pub value: f32,
}

impl Metric {
    pub fn new(metric_type: MetricType, value: f32) -> Self {
        Self { metric_type, value }
    }
}

/// Kind of measurement, shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Temperature,
    Humidity,
    BatteryVoltage,
    BatteryCurrent,
    BatteryCapacity,
    BatteryTemperature,
    BatteryRuntime,
    InputVoltage,
    InputFrequency,
    OutputVoltage,
    OutputCurrent,
    OutputFrequency,
    OutputLoad,
    OutputPower,
    PowerConsumption,
    Energy,
    DcVoltage,
    DcCurrent,
    FanSpeed,
    DoorOpen,
    SmokeDetected,
    WaterLeak,
    CpuUsage,
    MemoryUsage,
    Uptime,
    InterfaceInOctets,
    InterfaceOutOctets,
    RfOutputPower,
    Vswr,
    SignalStrength,
    FiberRxPower,
    FiberTxPower,
}

impl MetricType {
    /// Every metric type, in declaration order.
    pub const ALL: [MetricType; 32] = [
        MetricType::Temperature,
        MetricType::Humidity,
        MetricType::BatteryVoltage,
        MetricType::BatteryCurrent,
        MetricType::BatteryCapacity,
        MetricType::BatteryTemperature,
        MetricType::BatteryRuntime,
        MetricType::InputVoltage,
        MetricType::InputFrequency,
        MetricType::OutputVoltage,
        MetricType::OutputCurrent,
        MetricType::OutputFrequency,
        MetricType::OutputLoad,
        MetricType::OutputPower,
        MetricType::PowerConsumption,
        MetricType::Energy,
        MetricType::DcVoltage,
        MetricType::DcCurrent,
        MetricType::FanSpeed,
        MetricType::DoorOpen,
        MetricType::SmokeDetected,
        MetricType::WaterLeak,
        MetricType::CpuUsage,
        MetricType::MemoryUsage,
        MetricType::Uptime,
        MetricType::InterfaceInOctets,
        MetricType::InterfaceOutOctets,
        MetricType::RfOutputPower,
        MetricType::Vswr,
        MetricType::SignalStrength,
        MetricType::FiberRxPower,
        MetricType::FiberTxPower,
    ];

    /// Get the snake_case name used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Temperature => "temperature",
            MetricType::Humidity => "humidity",
            MetricType::BatteryVoltage => "battery_voltage",
            MetricType::BatteryCurrent => "battery_current",
            MetricType::BatteryCapacity => "battery_capacity",
            MetricType::BatteryTemperature => "battery_temperature",
            MetricType::BatteryRuntime => "battery_runtime",
            MetricType::InputVoltage => "input_voltage",
            MetricType::InputFrequency => "input_frequency",
            MetricType::OutputVoltage => "output_voltage",
            MetricType::OutputCurrent => "output_current",
            MetricType::OutputFrequency => "output_frequency",
            MetricType::OutputLoad => "output_load",
            MetricType::OutputPower => "output_power",
            MetricType::PowerConsumption => "power_consumption",
            MetricType::Energy => "energy",
            MetricType::DcVoltage => "dc_voltage",
            MetricType::DcCurrent => "dc_current",
            MetricType::FanSpeed => "fan_speed",
            MetricType::DoorOpen => "door_open",
            MetricType::SmokeDetected => "smoke_detected",
            MetricType::WaterLeak => "water_leak",
            MetricType::CpuUsage => "cpu_usage",
            MetricType::MemoryUsage => "memory_usage",
            MetricType::Uptime => "uptime",
            MetricType::InterfaceInOctets => "interface_in_octets",
            MetricType::InterfaceOutOctets => "interface_out_octets",
            MetricType::RfOutputPower => "rf_output_power",
            MetricType::Vswr => "vswr",
            MetricType::SignalStrength => "signal_strength",
            MetricType::FiberRxPower => "fiber_rx_power",
            MetricType::FiberTxPower => "fiber_tx_power",
        }
    }

    /// Unit of measurement after scaling.
    pub fn unit(&self) -> &'static str {
        match self {
            MetricType::Temperature
            | MetricType::BatteryTemperature => "°C",
            MetricType::Humidity
            | MetricType::BatteryCapacity
            | MetricType::OutputLoad
            | MetricType::CpuUsage
            | MetricType::MemoryUsage => "%",
            MetricType::BatteryVoltage
            | MetricType::InputVoltage
            | MetricType::OutputVoltage
            | MetricType::DcVoltage => "V",
            MetricType::BatteryCurrent | MetricType::OutputCurrent | MetricType::DcCurrent => "A",
            MetricType::InputFrequency | MetricType::OutputFrequency => "Hz",
            MetricType::OutputPower | MetricType::PowerConsumption => "W",
            MetricType::Energy => "kWh",
            MetricType::BatteryRuntime => "min",
            MetricType::FanSpeed => "rpm",
            MetricType::Uptime => "s",
            MetricType::InterfaceInOctets | MetricType::InterfaceOutOctets => "B",
            MetricType::RfOutputPower
            | MetricType::SignalStrength
            | MetricType::FiberRxPower
            | MetricType::FiberTxPower => "dBm",
            MetricType::DoorOpen
            | MetricType::SmokeDetected
            | MetricType::WaterLeak
            | MetricType::Vswr => "",
        }
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        MetricType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| Error::UnknownMetricType(s.to_string()))
    }
}

/// Rule turning a raw protocol value into a normalized [`Metric`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricMapping {
    /// Protocol-side identifier (an SNMP OID, a register name, ...).
    pub external_id: String,

    pub metric_type: MetricType,

    /// Multiplier applied to the raw value.
    #[serde(default = "default_scale")]
    pub scale: f32,

    /// Added after scaling.
    #[serde(default)]
    pub offset: f32,

    #[serde(default)]
    pub description: String,
}

fn default_scale() -> f32 {
    1.0
}

impl MetricMapping {
    pub fn new(
        external_id: impl Into<String>,
        metric_type: MetricType,
        scale: f32,
        offset: f32,
        description: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            metric_type,
            scale,
            offset,
            description: description.into(),
        }
    }

    /// `raw * scale + offset`
    pub fn apply_transform(&self, raw: f32) -> f32 {
        raw * self.scale + self.offset
    }

    /// Transform a raw value into a metric of this mapping's type.
    pub fn to_metric(&self, raw: f32) -> Metric {
        Metric::new(self.metric_type, self.apply_transform(raw))
    }
}
