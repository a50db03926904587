//! Built-in OID tables.
//!
//! Tables are plain values: [`OidTables::builtin`] constructs them once and
//! adapters only ever read from them.

use std::collections::BTreeMap;

use sitelink_common::{MetricMapping, MetricType};

/// Vendor selector that pulls in every vendor table.
pub const ALL_VENDORS: &str = "all";

/// One static table row.
struct Row {
    oid: &'static str,
    metric_type: MetricType,
    scale: f32,
    offset: f32,
    description: &'static str,
}

const fn row(oid: &'static str, metric_type: MetricType, description: &'static str) -> Row {
    scaled(oid, metric_type, 1.0, description)
}

const fn scaled(
    oid: &'static str,
    metric_type: MetricType,
    scale: f32,
    description: &'static str,
) -> Row {
    Row {
        oid,
        metric_type,
        scale,
        offset: 0.0,
        description,
    }
}

/// A named group of OID mappings.
#[derive(Debug, Clone, PartialEq)]
pub struct OidTable {
    pub module: String,
    pub mappings: Vec<MetricMapping>,
}

impl OidTable {
    fn from_rows(module: &str, rows: &[Row]) -> Self {
        Self {
            module: module.to_string(),
            mappings: rows
                .iter()
                .map(|r| MetricMapping::new(r.oid, r.metric_type, r.scale, r.offset, r.description))
                .collect(),
        }
    }
}

/// The standard table plus every vendor table, keyed by device type.
#[derive(Debug, Clone)]
pub struct OidTables {
    standard: Vec<OidTable>,
    vendors: BTreeMap<String, OidTable>,
}

impl OidTables {
    /// Tables shipped with the gateway.
    pub fn builtin() -> Self {
        let standard = vec![
            OidTable::from_rows("UPS-MIB", UPS_MIB),
            OidTable::from_rows("HOST-RESOURCES-MIB", HOST_RESOURCES_MIB),
            OidTable::from_rows("IF-MIB", IF_MIB),
        ];

        let vendors = [
            ("vertiv", VERTIV),
            ("schneider", SCHNEIDER),
            ("ericsson", ERICSSON),
            ("nokia", NOKIA),
            ("environment", ENVIRONMENT),
            ("fiber", FIBER),
        ]
        .into_iter()
        .map(|(name, rows)| (name.to_string(), OidTable::from_rows(name, rows)))
        .collect();

        Self { standard, vendors }
    }

    /// Start from an empty set; used to assemble custom table sets.
    pub fn empty() -> Self {
        Self {
            standard: Vec::new(),
            vendors: BTreeMap::new(),
        }
    }

    pub fn with_standard(mut self, table: OidTable) -> Self {
        self.standard.push(table);
        self
    }

    pub fn with_vendor(mut self, device_type: impl Into<String>, table: OidTable) -> Self {
        self.vendors.insert(device_type.into(), table);
        self
    }

    /// Mappings present for every device.
    pub fn standard(&self) -> impl Iterator<Item = &MetricMapping> {
        self.standard.iter().flat_map(|t| t.mappings.iter())
    }

    /// Vendor mappings for a device type; [`ALL_VENDORS`] selects every
    /// vendor table. Unknown device types yield nothing.
    pub fn vendor(&self, device_type: &str) -> Vec<&MetricMapping> {
        let key = device_type.trim().to_ascii_lowercase();
        if key == ALL_VENDORS {
            return self
                .vendors
                .values()
                .flat_map(|t| t.mappings.iter())
                .collect();
        }

        self.vendors
            .get(&key)
            .map(|t| t.mappings.iter().collect())
            .unwrap_or_default()
    }

    pub fn has_vendor(&self, device_type: &str) -> bool {
        let key = device_type.trim().to_ascii_lowercase();
        key == ALL_VENDORS || self.vendors.contains_key(&key)
    }

    /// Known vendor device types.
    pub fn vendor_names(&self) -> impl Iterator<Item = &str> {
        self.vendors.keys().map(String::as_str)
    }
}

impl Default for OidTables {
    fn default() -> Self {
        Self::builtin()
    }
}

// --- Standard MIBs ---

const UPS_MIB: &[Row] = &[
    row("1.3.6.1.2.1.33.1.2.3.0", MetricType::BatteryRuntime, "upsEstimatedMinutesRemaining"),
    row("1.3.6.1.2.1.33.1.2.4.0", MetricType::BatteryCapacity, "upsEstimatedChargeRemaining"),
    scaled("1.3.6.1.2.1.33.1.2.5.0", MetricType::BatteryVoltage, 0.1, "upsBatteryVoltage (0.1 V)"),
    scaled("1.3.6.1.2.1.33.1.2.6.0", MetricType::BatteryCurrent, 0.1, "upsBatteryCurrent (0.1 A)"),
    row("1.3.6.1.2.1.33.1.2.7.0", MetricType::BatteryTemperature, "upsBatteryTemperature"),
    scaled("1.3.6.1.2.1.33.1.3.3.1.2.1", MetricType::InputFrequency, 0.1, "upsInputFrequency (0.1 Hz)"),
    row("1.3.6.1.2.1.33.1.3.3.1.3.1", MetricType::InputVoltage, "upsInputVoltage"),
    scaled("1.3.6.1.2.1.33.1.4.2.0", MetricType::OutputFrequency, 0.1, "upsOutputFrequency (0.1 Hz)"),
    row("1.3.6.1.2.1.33.1.4.4.1.2.1", MetricType::OutputVoltage, "upsOutputVoltage"),
    scaled("1.3.6.1.2.1.33.1.4.4.1.3.1", MetricType::OutputCurrent, 0.1, "upsOutputCurrent (0.1 A)"),
    row("1.3.6.1.2.1.33.1.4.4.1.4.1", MetricType::OutputPower, "upsOutputPower"),
    row("1.3.6.1.2.1.33.1.4.4.1.5.1", MetricType::OutputLoad, "upsOutputPercentLoad"),
];

const HOST_RESOURCES_MIB: &[Row] = &[
    scaled("1.3.6.1.2.1.25.1.1.0", MetricType::Uptime, 0.01, "hrSystemUptime (centiseconds)"),
    row("1.3.6.1.2.1.25.3.3.1.2.1", MetricType::CpuUsage, "hrProcessorLoad.1"),
];

const IF_MIB: &[Row] = &[
    row("1.3.6.1.2.1.2.2.1.10.1", MetricType::InterfaceInOctets, "ifInOctets.1"),
    row("1.3.6.1.2.1.2.2.1.16.1", MetricType::InterfaceOutOctets, "ifOutOctets.1"),
];

// --- Vendor tables ---

const VERTIV: &[Row] = &[
    scaled("1.3.6.1.4.1.476.1.42.3.9.20.1.20.1.2.1.4148", MetricType::DcVoltage, 0.01, "Liebert DC system voltage"),
    scaled("1.3.6.1.4.1.476.1.42.3.9.20.1.20.1.2.1.4156", MetricType::DcCurrent, 0.01, "Liebert DC system load current"),
    row("1.3.6.1.4.1.476.1.42.3.9.20.1.20.1.2.1.5283", MetricType::PowerConsumption, "Liebert system output power"),
    row("1.3.6.1.4.1.476.1.42.3.4.1.3.3.1.3.1", MetricType::Temperature, "lgpEnvTemperatureMeasurementDegC"),
    row("1.3.6.1.4.1.476.1.42.3.4.2.3.3.1.3.1", MetricType::Humidity, "lgpEnvHumidityMeasurementRel"),
    row("1.3.6.1.4.1.476.1.42.3.9.20.1.20.1.2.1.4162", MetricType::BatteryCapacity, "Liebert battery charge"),
];

const SCHNEIDER: &[Row] = &[
    row("1.3.6.1.4.1.318.1.1.1.2.2.1.0", MetricType::BatteryCapacity, "upsAdvBatteryCapacity"),
    row("1.3.6.1.4.1.318.1.1.1.2.2.2.0", MetricType::BatteryTemperature, "upsAdvBatteryTemperature"),
    scaled("1.3.6.1.4.1.318.1.1.1.2.2.3.0", MetricType::BatteryRuntime, 1.0 / 6000.0, "upsAdvBatteryRunTimeRemaining (ticks)"),
    row("1.3.6.1.4.1.318.1.1.1.2.2.8.0", MetricType::BatteryVoltage, "upsAdvBatteryActualVoltage"),
    row("1.3.6.1.4.1.318.1.1.1.3.2.1.0", MetricType::InputVoltage, "upsAdvInputLineVoltage"),
    row("1.3.6.1.4.1.318.1.1.1.3.2.4.0", MetricType::InputFrequency, "upsAdvInputFrequency"),
    row("1.3.6.1.4.1.318.1.1.1.4.2.1.0", MetricType::OutputVoltage, "upsAdvOutputVoltage"),
    row("1.3.6.1.4.1.318.1.1.1.4.2.2.0", MetricType::OutputFrequency, "upsAdvOutputFrequency"),
    row("1.3.6.1.4.1.318.1.1.1.4.2.3.0", MetricType::OutputLoad, "upsAdvOutputLoad"),
    row("1.3.6.1.4.1.318.1.1.1.4.2.4.0", MetricType::OutputCurrent, "upsAdvOutputCurrent"),
];

const ERICSSON: &[Row] = &[
    scaled("1.3.6.1.4.1.193.140.1.3.1.1.0", MetricType::DcVoltage, 0.01, "PSU system voltage"),
    scaled("1.3.6.1.4.1.193.140.1.3.1.2.0", MetricType::DcCurrent, 0.1, "PSU load current"),
    scaled("1.3.6.1.4.1.193.140.1.4.1.1.0", MetricType::RfOutputPower, 0.1, "Radio unit output power"),
    scaled("1.3.6.1.4.1.193.140.1.4.1.2.0", MetricType::Vswr, 0.01, "Antenna VSWR"),
    row("1.3.6.1.4.1.193.140.1.5.1.1.0", MetricType::Temperature, "Cabinet temperature"),
    row("1.3.6.1.4.1.193.140.1.5.1.2.0", MetricType::FanSpeed, "Cabinet fan speed"),
];

const NOKIA: &[Row] = &[
    scaled("1.3.6.1.4.1.94.1.21.1.1.5.1.3.1", MetricType::DcVoltage, 0.1, "System module DC input voltage"),
    scaled("1.3.6.1.4.1.94.1.21.1.1.5.1.4.1", MetricType::RfOutputPower, 0.1, "RF module transmit power"),
    scaled("1.3.6.1.4.1.94.1.21.1.1.5.1.5.1", MetricType::Vswr, 0.01, "RF module VSWR"),
    scaled("1.3.6.1.4.1.94.1.21.1.1.5.1.6.1", MetricType::SignalStrength, 0.1, "Received signal strength"),
    row("1.3.6.1.4.1.94.1.21.1.1.5.1.7.1", MetricType::Temperature, "System module temperature"),
];

const ENVIRONMENT: &[Row] = &[
    scaled("1.3.6.1.4.1.5528.100.4.1.1.1.8.1", MetricType::Temperature, 0.1, "Temperature sensor (0.1 C)"),
    row("1.3.6.1.4.1.5528.100.4.1.2.1.8.1", MetricType::Humidity, "Humidity sensor"),
    row("1.3.6.1.4.1.5528.100.4.2.2.1.2.1", MetricType::DoorOpen, "Door switch (1 = open)"),
    row("1.3.6.1.4.1.5528.100.4.2.2.1.2.2", MetricType::SmokeDetected, "Smoke detector (1 = alarm)"),
    row("1.3.6.1.4.1.5528.100.4.2.2.1.2.3", MetricType::WaterLeak, "Leak rope (1 = leak)"),
];

const FIBER: &[Row] = &[
    scaled("1.3.6.1.2.1.99.1.1.1.4.1001", MetricType::FiberRxPower, 0.1, "SFP receive power (0.1 dBm)"),
    scaled("1.3.6.1.2.1.99.1.1.1.4.1002", MetricType::FiberTxPower, 0.1, "SFP transmit power (0.1 dBm)"),
    scaled("1.3.6.1.2.1.99.1.1.1.4.1003", MetricType::Temperature, 0.1, "SFP module temperature"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid::normalize_oid;

    #[test]
    fn test_builtin_has_standard_tables() {
        let tables = OidTables::builtin();
        let battery = tables
            .standard()
            .find(|m| m.external_id == "1.3.6.1.2.1.33.1.2.5.0")
            .unwrap();
        assert_eq!(battery.metric_type, MetricType::BatteryVoltage);
        assert_eq!(battery.scale, 0.1);
        assert!(tables.standard().any(|m| m.metric_type == MetricType::InterfaceInOctets));
        assert!(tables.standard().any(|m| m.metric_type == MetricType::CpuUsage));
    }

    #[test]
    fn test_vendor_selection() {
        let tables = OidTables::builtin();

        let vertiv = tables.vendor("vertiv");
        assert!(!vertiv.is_empty());
        assert!(vertiv.iter().all(|m| m.external_id.starts_with("1.3.6.1.4.1.476.")));

        assert_eq!(tables.vendor("Schneider").len(), SCHNEIDER.len());
        assert!(tables.vendor("acme").is_empty());
        assert!(!tables.has_vendor("acme"));
    }

    #[test]
    fn test_all_selects_every_vendor() {
        let tables = OidTables::builtin();
        let total: usize = tables.vendor_names().map(|v| tables.vendor(v).len()).sum();
        assert_eq!(tables.vendor(ALL_VENDORS).len(), total);
        assert_eq!(tables.vendor_names().count(), 6);
    }

    #[test]
    fn test_every_builtin_oid_is_normalized() {
        let tables = OidTables::builtin();
        for mapping in tables.standard().chain(tables.vendor(ALL_VENDORS)) {
            assert_eq!(normalize_oid(&mapping.external_id).unwrap(), mapping.external_id);
        }
    }
}
