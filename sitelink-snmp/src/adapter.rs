use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use sitelink_common::{Metric, MetricAdapter, MetricType};

use crate::client::{SessionClient, SnmpClient};
use crate::config::SnmpAdapterConfig;
use crate::error::{Result, SnmpError};
use crate::mapping::MappingSet;
use crate::tables::OidTables;

/// OIDs per GET request.
pub const BATCH_SIZE: usize = 10;

/// Metric adapter polling one SNMP agent.
pub struct SnmpAdapter {
    config: SnmpAdapterConfig,
    mappings: MappingSet,
    client: Mutex<Option<Box<dyn SnmpClient>>>,
    connected: AtomicBool,
}

impl SnmpAdapter {
    /// Validate the configuration and build the adapter's mapping set.
    pub fn new(config: SnmpAdapterConfig, tables: &OidTables) -> Result<Self> {
        config.validate()?;

        let mappings =
            MappingSet::build(tables, config.device_type.as_deref(), &config.custom_mappings)?;

        tracing::debug!(
            adapter = %config.name,
            agent = %config.target(),
            mappings = mappings.len(),
            "SNMP adapter created"
        );

        Ok(Self {
            config,
            mappings,
            client: Mutex::new(None),
            connected: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &SnmpAdapterConfig {
        &self.config
    }

    pub fn mappings(&self) -> &MappingSet {
        &self.mappings
    }

    /// Use an already-open client instead of opening a UDP session.
    pub async fn attach(&self, client: Box<dyn SnmpClient>) {
        *self.client.lock().await = Some(client);
        self.connected.store(true, Ordering::SeqCst);
    }

    /// GET the OIDs in batches of [`BATCH_SIZE`].
    ///
    /// A failed batch is logged and skipped. The call only fails when no
    /// batch succeeded.
    async fn collect(&self, oids: &[String]) -> Result<Vec<Metric>> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(SnmpError::NotConnected)?;

        let mut metrics = Vec::with_capacity(oids.len());
        let mut last_error = None;
        let mut succeeded = 0;

        for (batch, chunk) in oids.chunks(BATCH_SIZE).enumerate() {
            let varbinds = match client.get(chunk).await {
                Ok(varbinds) => varbinds,
                Err(e) => {
                    tracing::warn!(
                        adapter = %self.config.name,
                        batch,
                        oids = chunk.len(),
                        error = %e,
                        "SNMP batch failed, continuing"
                    );
                    last_error = Some(e);
                    continue;
                }
            };
            succeeded += 1;

            for (oid, value) in varbinds {
                if value.is_error_marker() {
                    tracing::trace!(adapter = %self.config.name, oid = %oid, "No value for OID");
                    continue;
                }
                let Some(mapping) = self.mappings.get(&oid) else {
                    tracing::debug!(adapter = %self.config.name, oid = %oid, "Unmapped OID in response");
                    continue;
                };
                let Some(raw) = value.as_f32() else {
                    tracing::debug!(
                        adapter = %self.config.name,
                        oid = %oid,
                        value = ?value,
                        "Non-numeric SNMP value"
                    );
                    continue;
                };
                metrics.push(mapping.to_metric(raw));
            }
        }

        match last_error {
            Some(e) if succeeded == 0 => Err(e),
            _ => Ok(metrics),
        }
    }

    fn adapter_error(&self, err: SnmpError) -> sitelink_common::Error {
        match err {
            SnmpError::NotConnected => sitelink_common::Error::NotConnected {
                adapter: self.config.name.clone(),
            },
            other => sitelink_common::Error::adapter(&self.config.name, other.to_string()),
        }
    }
}

#[async_trait]
impl MetricAdapter for SnmpAdapter {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn connect(&self) -> sitelink_common::Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        tracing::info!(
            adapter = %self.config.name,
            agent = %self.config.target(),
            version = ?self.config.version,
            "Connecting to SNMP agent"
        );

        let client = SessionClient::open(&self.config)
            .await
            .map_err(|e| self.adapter_error(e))?;
        self.attach(Box::new(client)).await;
        Ok(())
    }

    async fn close(&self) -> sitelink_common::Result<()> {
        if self.client.lock().await.take().is_some() {
            tracing::info!(adapter = %self.config.name, "SNMP adapter closed");
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn collect_metrics(&self) -> sitelink_common::Result<Vec<Metric>> {
        let oids = self.mappings.oids();
        self.collect(&oids).await.map_err(|e| self.adapter_error(e))
    }

    async fn collect_metric(
        &self,
        metric_type: MetricType,
    ) -> sitelink_common::Result<Option<Metric>> {
        let Some(mapping) = self.mappings.find_by_type(metric_type) else {
            return Ok(None);
        };

        let metrics = self
            .collect(std::slice::from_ref(&mapping.external_id))
            .await
            .map_err(|e| self.adapter_error(e))?;
        Ok(metrics.into_iter().find(|m| m.metric_type == metric_type))
    }
}
