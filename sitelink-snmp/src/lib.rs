//! SNMP metric adapter.
//!
//! Polls an SNMP v2c/v3 agent with GET requests and turns the answers into
//! [`Metric`](sitelink_common::Metric)s. Which OIDs are queried comes from a
//! [`MappingSet`] assembled from the standard MIB table, an optional vendor
//! table selected by `device_type`, and user-supplied custom mappings.

pub mod adapter;
pub mod client;
pub mod config;
pub mod error;
pub mod mapping;
pub mod oid;
pub mod tables;

pub use adapter::{BATCH_SIZE, SnmpAdapter};
pub use client::{PduValue, SessionClient, SnmpClient};
pub use config::{CustomMapping, SecurityLevel, SnmpAdapterConfig, SnmpSecurity, SnmpVersion};
pub use error::{Result, SnmpError};
pub use mapping::MappingSet;
pub use tables::OidTables;
