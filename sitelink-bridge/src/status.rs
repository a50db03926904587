//! Bridge lifecycle state and status snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a [`Bridge`](crate::Bridge):
/// `Created → Starting → Started → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    Created,
    Starting,
    Started,
    Stopping,
    Stopped,
}

impl BridgeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeState::Created => "created",
            BridgeState::Starting => "starting",
            BridgeState::Started => "started",
            BridgeState::Stopping => "stopping",
            BridgeState::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection flag of one adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterStatus {
    pub name: String,
    pub connected: bool,
}

/// Point-in-time view of the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Gateway version.
    pub version: String,
    pub state: BridgeState,
    /// Configured station id.
    pub station_id: String,
    /// Backend record id, once resolved.
    pub resolved_station_id: Option<i64>,
    pub authenticated: bool,
    pub adapters: Vec<AdapterStatus>,
    /// Metrics currently held in the latest-metrics cache.
    pub cached_metrics: usize,
    pub last_upload: Option<DateTime<Utc>>,
}

impl BridgeStatus {
    /// Adapters currently connected.
    pub fn connected_adapters(&self) -> usize {
        self.adapters.iter().filter(|a| a.connected).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let status = BridgeStatus {
            version: "0.3.0".into(),
            state: BridgeState::Started,
            station_id: "BS-001".into(),
            resolved_station_id: Some(42),
            authenticated: true,
            adapters: vec![
                AdapterStatus {
                    name: "bsc".into(),
                    connected: true,
                },
                AdapterStatus {
                    name: "ups".into(),
                    connected: false,
                },
            ],
            cached_metrics: 12,
            last_upload: None,
        };

        assert_eq!(status.connected_adapters(), 1);

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"state\":\"started\""));
        assert!(json.contains("\"resolved_station_id\":42"));
    }
}
