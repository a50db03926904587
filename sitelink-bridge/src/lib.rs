//! SiteLink edge gateway.
//!
//! Connects the site's equipment (a controller speaking the framed protocol
//! and any number of SNMP agents) to the management backend:
//!
//! - [`Bridge`] - lifecycle and the metrics, command and event loops
//! - [`CommandExecutor`] - runs backend commands on the device
//! - [`registration`] - idempotent station self-registration
//! - [`convert`] - mapping to the backend's metric vocabulary
//! - [`GatewayConfig`] - JSON5 configuration
//! - [`BridgeArgs`] - command-line arguments

mod args;
pub mod bridge;
pub mod config;
pub mod convert;
mod error;
pub mod executor;
pub mod registration;
mod status;

pub use args::BridgeArgs;
pub use bridge::{Bridge, BridgeSettings};
pub use config::{GatewayConfig, IntervalsConfig, StationConfig};
pub use error::{BridgeError, Result};
pub use executor::{CommandExecutor, CycleReport};
pub use registration::{StationIdentity, resolve_station};
pub use status::{AdapterStatus, BridgeState, BridgeStatus};
