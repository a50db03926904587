//! Configuration for a framed-protocol device session.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DeviceError, Result};

/// Configuration for a single site controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSessionConfig {
    /// Device name (used in logs and as the adapter name)
    #[serde(default = "default_name")]
    pub name: String,

    /// Connection type and address
    pub connection: ConnectionConfig,

    /// Timeout for a single request/response exchange in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Capacity of the pushed-event queue
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_name() -> String {
    "controller".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_connect_timeout_ms() -> u64 {
    3000
}

fn default_event_buffer() -> usize {
    64
}

/// Connection configuration (TCP or serial).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionConfig {
    /// TCP connection to the controller
    Tcp {
        /// Host address (IP or hostname)
        host: String,
        /// TCP port (default: 4001)
        #[serde(default = "default_tcp_port")]
        port: u16,
    },
    /// Serial line to the controller
    Serial {
        /// Serial port path (e.g., "/dev/ttyUSB0" or "COM1")
        path: String,
        /// Baud rate (default: 9600)
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        /// Data bits (default: 8)
        #[serde(default = "default_data_bits")]
        data_bits: u8,
        /// Parity: "none", "even", or "odd" (default: "none")
        #[serde(default = "default_parity")]
        parity: String,
        /// Stop bits: 1 or 2 (default: 1)
        #[serde(default = "default_stop_bits")]
        stop_bits: u8,
    },
}

fn default_tcp_port() -> u16 {
    4001
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_data_bits() -> u8 {
    8
}

fn default_parity() -> String {
    "none".to_string()
}

fn default_stop_bits() -> u8 {
    1
}

impl ConnectionConfig {
    /// Short description for logs ("tcp://host:port", "serial:///dev/ttyS0@9600").
    pub fn describe(&self) -> String {
        match self {
            ConnectionConfig::Tcp { host, port } => format!("tcp://{}:{}", host, port),
            ConnectionConfig::Serial {
                path, baud_rate, ..
            } => format!("serial://{}@{}", path, baud_rate),
        }
    }
}

impl DeviceSessionConfig {
    /// Build a config for a TCP-attached controller with default timeouts.
    pub fn tcp(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            connection: ConnectionConfig::Tcp {
                host: host.into(),
                port,
            },
            request_timeout_ms: default_request_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            event_buffer: default_event_buffer(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Check mandatory fields.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(DeviceError::Config("device name cannot be empty".into()));
        }
        match &self.connection {
            ConnectionConfig::Tcp { host, port } => {
                if host.is_empty() {
                    return Err(DeviceError::Config(format!(
                        "device '{}' has no host",
                        self.name
                    )));
                }
                if *port == 0 {
                    return Err(DeviceError::Config(format!(
                        "device '{}' has an invalid port",
                        self.name
                    )));
                }
            }
            ConnectionConfig::Serial {
                path, baud_rate, ..
            } => {
                if path.is_empty() {
                    return Err(DeviceError::Config(format!(
                        "device '{}' has no serial path",
                        self.name
                    )));
                }
                if *baud_rate == 0 {
                    return Err(DeviceError::Config(format!(
                        "device '{}' has an invalid baud rate",
                        self.name
                    )));
                }
            }
        }
        if self.request_timeout_ms == 0 {
            return Err(DeviceError::Config(format!(
                "device '{}' needs a non-zero request timeout",
                self.name
            )));
        }
        if self.event_buffer == 0 {
            return Err(DeviceError::Config(format!(
                "device '{}' needs a non-zero event buffer",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serial_defaults() {
        let config: DeviceSessionConfig = json5::from_str(
            r#"{ name: "bsc", connection: { type: "serial", path: "/dev/ttyUSB0" } }"#,
        )
        .unwrap();

        match &config.connection {
            ConnectionConfig::Serial {
                baud_rate,
                data_bits,
                parity,
                stop_bits,
                ..
            } => {
                assert_eq!(*baud_rate, 9600);
                assert_eq!(*data_bits, 8);
                assert_eq!(parity, "none");
                assert_eq!(*stop_bits, 1);
            }
            other => panic!("unexpected connection {:?}", other),
        }
        assert_eq!(config.request_timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_tcp() {
        let config: DeviceSessionConfig = json5::from_str(
            r#"{ connection: { type: "tcp", host: "10.0.0.5" } }"#,
        )
        .unwrap();

        assert_eq!(config.name, "controller");
        assert_eq!(
            config.connection,
            ConnectionConfig::Tcp {
                host: "10.0.0.5".into(),
                port: 4001
            }
        );
        assert_eq!(config.connection.describe(), "tcp://10.0.0.5:4001");
    }

    #[test]
    fn test_validate_rejects_empty_host() {
        let config = DeviceSessionConfig::tcp("bsc", "", 4001);
        assert!(matches!(config.validate(), Err(DeviceError::Config(_))));
    }
}
