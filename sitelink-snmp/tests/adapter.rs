//! SNMP adapter tests against a scripted client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use sitelink_common::{MetricAdapter, MetricMapping, MetricType};
use sitelink_snmp::tables::OidTable;
use sitelink_snmp::{
    CustomMapping, OidTables, PduValue, SnmpAdapter, SnmpAdapterConfig, SnmpClient, SnmpError,
};

/// Answers GETs from a fixed OID → value map and records every request.
#[derive(Clone, Default)]
struct ScriptedClient {
    values: Arc<HashMap<String, PduValue>>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
    /// Zero-based request numbers that fail.
    failing: Arc<Vec<usize>>,
}

impl ScriptedClient {
    fn new(values: HashMap<String, PduValue>) -> Self {
        Self {
            values: Arc::new(values),
            ..Default::default()
        }
    }

    fn failing_on(mut self, requests: &[usize]) -> Self {
        self.failing = Arc::new(requests.to_vec());
        self
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl SnmpClient for ScriptedClient {
    async fn get(&mut self, oids: &[String]) -> sitelink_snmp::Result<Vec<(String, PduValue)>> {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(oids.to_vec());
            calls.len() - 1
        };

        if self.failing.contains(&call) {
            return Err(SnmpError::Request("simulated timeout".into()));
        }

        Ok(oids
            .iter()
            .map(|oid| {
                let value = self
                    .values
                    .get(oid)
                    .cloned()
                    .unwrap_or(PduValue::NoSuchObject);
                (oid.clone(), value)
            })
            .collect())
    }
}

/// A table with `n` temperature OIDs under a private arc.
fn synthetic_tables(n: usize) -> OidTables {
    let mappings = (0..n)
        .map(|i| {
            MetricMapping::new(
                format!("1.3.6.1.4.1.55555.1.{}.0", i),
                MetricType::Temperature,
                1.0,
                0.0,
                "",
            )
        })
        .collect();
    OidTables::empty().with_standard(OidTable {
        module: "TEST-MIB".into(),
        mappings,
    })
}

fn synthetic_values(n: usize) -> HashMap<String, PduValue> {
    (0..n)
        .map(|i| {
            (
                format!("1.3.6.1.4.1.55555.1.{}.0", i),
                PduValue::Integer(i as i64),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_battery_voltage_scaled() {
    let tables = OidTables::empty();
    let mut config = SnmpAdapterConfig::v2c("ups-1", "10.0.0.5");
    config.custom_mappings = vec![CustomMapping {
        oid: ".1.3.6.1.2.1.33.1.2.5.0".into(),
        metric_type: "battery_voltage".into(),
        scale: 0.1,
        offset: 0.0,
        description: "upsBatteryVoltage".into(),
    }];

    let adapter = SnmpAdapter::new(config, &tables).unwrap();
    let client = ScriptedClient::new(HashMap::from([(
        "1.3.6.1.2.1.33.1.2.5.0".to_string(),
        PduValue::Integer(2203),
    )]));
    adapter.attach(Box::new(client)).await;

    let metrics = adapter.collect_metrics().await.unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].metric_type, MetricType::BatteryVoltage);
    assert!((metrics[0].value - 220.3).abs() < 1e-3);
}

#[tokio::test]
async fn test_builtin_ups_table_scales_battery_voltage() {
    let adapter =
        SnmpAdapter::new(SnmpAdapterConfig::v2c("ups-1", "10.0.0.5"), &OidTables::builtin())
            .unwrap();
    let client = ScriptedClient::new(HashMap::from([(
        "1.3.6.1.2.1.33.1.2.5.0".to_string(),
        PduValue::Integer(2203),
    )]));
    adapter.attach(Box::new(client)).await;

    let metric = adapter
        .collect_metric(MetricType::BatteryVoltage)
        .await
        .unwrap()
        .unwrap();
    assert!((metric.value - 220.3).abs() < 1e-3);

    // Nothing maps to this type.
    assert!(adapter.collect_metric(MetricType::Vswr).await.unwrap().is_none());
}

#[tokio::test]
async fn test_request_count_is_ceil_n_over_10() {
    for n in [1usize, 9, 10, 11, 20, 25] {
        let adapter =
            SnmpAdapter::new(SnmpAdapterConfig::v2c("env", "10.0.0.7"), &synthetic_tables(n))
                .unwrap();
        let client = ScriptedClient::new(synthetic_values(n));
        adapter.attach(Box::new(client.clone())).await;

        let metrics = adapter.collect_metrics().await.unwrap();

        let calls = client.calls();
        assert_eq!(calls.len(), n.div_ceil(10), "n = {}", n);
        assert!(calls.iter().all(|c| c.len() <= 10));
        assert_eq!(metrics.len(), n);
    }
}

#[tokio::test]
async fn test_failed_batch_does_not_stop_collection() {
    let adapter =
        SnmpAdapter::new(SnmpAdapterConfig::v2c("env", "10.0.0.7"), &synthetic_tables(25))
            .unwrap();
    let client = ScriptedClient::new(synthetic_values(25)).failing_on(&[1]);
    adapter.attach(Box::new(client.clone())).await;

    let metrics = adapter.collect_metrics().await.unwrap();

    assert_eq!(client.calls().len(), 3);
    // Batches 0 and 2 answered: 10 + 5 readings.
    assert_eq!(metrics.len(), 15);
}

#[tokio::test]
async fn test_every_batch_failing_is_an_error() {
    let adapter =
        SnmpAdapter::new(SnmpAdapterConfig::v2c("env", "10.0.0.7"), &synthetic_tables(12))
            .unwrap();
    let client = ScriptedClient::new(synthetic_values(12)).failing_on(&[0, 1]);
    adapter.attach(Box::new(client.clone())).await;

    assert!(adapter.collect_metrics().await.is_err());
    assert_eq!(client.calls().len(), 2);
}

#[tokio::test]
async fn test_value_decoding() {
    let tables = OidTables::empty().with_standard(OidTable {
        module: "TEST-MIB".into(),
        mappings: vec![
            MetricMapping::new("1.3.6.1.9.1", MetricType::Temperature, 1.0, -40.0, ""),
            MetricMapping::new("1.3.6.1.9.2", MetricType::InterfaceInOctets, 1.0, 0.0, ""),
            MetricMapping::new("1.3.6.1.9.3", MetricType::DcVoltage, 1.0, 0.0, ""),
            MetricMapping::new("1.3.6.1.9.4", MetricType::Humidity, 1.0, 0.0, ""),
            MetricMapping::new("1.3.6.1.9.5", MetricType::FanSpeed, 1.0, 0.0, ""),
            MetricMapping::new("1.3.6.1.9.6", MetricType::Uptime, 0.01, 0.0, ""),
        ],
    });
    let adapter =
        SnmpAdapter::new(SnmpAdapterConfig::v2c("mixed", "10.0.0.8"), &tables).unwrap();
    let client = ScriptedClient::new(HashMap::from([
        ("1.3.6.1.9.1".to_string(), PduValue::Integer(65)),
        ("1.3.6.1.9.2".to_string(), PduValue::Counter64(5_000_000_000)),
        ("1.3.6.1.9.3".to_string(), PduValue::OctetString(b"53.5".to_vec())),
        ("1.3.6.1.9.4".to_string(), PduValue::OctetString(b"n/a".to_vec())),
        ("1.3.6.1.9.5".to_string(), PduValue::NoSuchInstance),
        ("1.3.6.1.9.6".to_string(), PduValue::Timeticks(12_300)),
    ]));
    adapter.attach(Box::new(client)).await;

    let metrics = adapter.collect_metrics().await.unwrap();
    let by_type: HashMap<_, _> = metrics.iter().map(|m| (m.metric_type, m.value)).collect();

    assert_eq!(metrics.len(), 5);
    assert_eq!(by_type[&MetricType::Temperature], 25.0);
    assert_eq!(by_type[&MetricType::InterfaceInOctets], 5_000_000_000u64 as f32);
    assert_eq!(by_type[&MetricType::DcVoltage], 53.5);
    assert_eq!(by_type[&MetricType::Humidity], 0.0);
    assert!((by_type[&MetricType::Uptime] - 123.0).abs() < 1e-3);
    assert!(!by_type.contains_key(&MetricType::FanSpeed));
}

#[tokio::test]
async fn test_not_connected() {
    let adapter =
        SnmpAdapter::new(SnmpAdapterConfig::v2c("ups-1", "10.0.0.5"), &OidTables::builtin())
            .unwrap();

    assert!(!adapter.is_connected());
    let err = adapter.collect_metrics().await.unwrap_err();
    assert!(matches!(err, sitelink_common::Error::NotConnected { .. }));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let adapter =
        SnmpAdapter::new(SnmpAdapterConfig::v2c("ups-1", "10.0.0.5"), &OidTables::builtin())
            .unwrap();
    adapter
        .attach(Box::new(ScriptedClient::new(HashMap::new())))
        .await;
    assert!(adapter.is_connected());

    // Connect on a connected adapter is a no-op.
    adapter.connect().await.unwrap();

    adapter.close().await.unwrap();
    assert!(!adapter.is_connected());
    adapter.close().await.unwrap();
}

#[test]
fn test_construction_fails_fast_on_empty_host() {
    let result = SnmpAdapter::new(SnmpAdapterConfig::v2c("ups-1", ""), &OidTables::builtin());
    assert!(matches!(result, Err(SnmpError::Config(_))));
}
