use std::collections::HashMap;

use sitelink_common::{MetricMapping, MetricType};

use crate::config::CustomMapping;
use crate::error::Result;
use crate::oid::normalize_oid;
use crate::tables::OidTables;

/// OID mappings of one adapter, keyed by normalized OID.
///
/// Built once at adapter construction and read-only afterwards. Insertion
/// order is kept so requests are batched deterministically; a later entry
/// for an OID replaces the earlier one in place.
#[derive(Debug, Clone, Default)]
pub struct MappingSet {
    mappings: Vec<MetricMapping>,
    index: HashMap<String, usize>,
}

impl MappingSet {
    /// Standard table, then the vendor table for `device_type`, then the
    /// custom mappings.
    pub fn build(
        tables: &OidTables,
        device_type: Option<&str>,
        custom: &[CustomMapping],
    ) -> Result<Self> {
        let mut set = Self::default();

        for mapping in tables.standard() {
            set.insert(mapping.clone())?;
        }

        if let Some(device_type) = device_type {
            if !tables.has_vendor(device_type) {
                tracing::warn!(
                    device_type = %device_type,
                    "Unknown device type, using standard OID table only"
                );
            }
            for mapping in tables.vendor(device_type) {
                set.insert(mapping.clone())?;
            }
        }

        for entry in custom {
            let Ok(metric_type) = entry.metric_type.parse::<MetricType>() else {
                tracing::debug!(
                    oid = %entry.oid,
                    metric_type = %entry.metric_type,
                    "Skipping custom mapping with unknown metric type"
                );
                continue;
            };
            set.insert(MetricMapping::new(
                entry.oid.as_str(),
                metric_type,
                entry.scale,
                entry.offset,
                entry.description.as_str(),
            ))?;
        }

        Ok(set)
    }

    /// Insert a mapping; replaces any mapping with the same OID.
    pub fn insert(&mut self, mut mapping: MetricMapping) -> Result<()> {
        mapping.external_id = normalize_oid(&mapping.external_id)?;

        match self.index.get(&mapping.external_id) {
            Some(&pos) => self.mappings[pos] = mapping,
            None => {
                self.index
                    .insert(mapping.external_id.clone(), self.mappings.len());
                self.mappings.push(mapping);
            }
        }
        Ok(())
    }

    /// Look up the mapping for an OID (leading dot optional).
    pub fn get(&self, oid: &str) -> Option<&MetricMapping> {
        let key = oid.strip_prefix('.').unwrap_or(oid);
        self.index.get(key).map(|&pos| &self.mappings[pos])
    }

    /// First mapping producing the given metric type.
    pub fn find_by_type(&self, metric_type: MetricType) -> Option<&MetricMapping> {
        self.mappings.iter().find(|m| m.metric_type == metric_type)
    }

    /// Normalized OIDs in insertion order.
    pub fn oids(&self) -> Vec<String> {
        self.mappings.iter().map(|m| m.external_id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricMapping> {
        self.mappings.iter()
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}
