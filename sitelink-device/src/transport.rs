//! Byte-stream transports: TCP sockets and serial lines.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{DeviceError, Result};

/// Anything the session can read frames from and write frames to.
pub trait ByteStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> ByteStream for T {}

/// Open the configured transport.
pub async fn open(connection: &ConnectionConfig, timeout: Duration) -> Result<Box<dyn ByteStream>> {
    match connection {
        ConnectionConfig::Tcp { host, port } => {
            let addr = format!("{}:{}", host, port);
            let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| DeviceError::Connection(format!("timeout connecting to {}", addr)))?
                .map_err(|e| DeviceError::Connection(format!("{}: {}", addr, e)))?;
            stream.set_nodelay(true)?;

            debug!(address = %addr, "TCP transport open");
            Ok(Box::new(stream))
        }
        ConnectionConfig::Serial {
            path,
            baud_rate,
            data_bits,
            parity,
            stop_bits,
        } => {
            let parity = match parity.to_lowercase().as_str() {
                "none" => tokio_serial::Parity::None,
                "even" => tokio_serial::Parity::Even,
                "odd" => tokio_serial::Parity::Odd,
                _ => tokio_serial::Parity::None,
            };

            let stop_bits = match stop_bits {
                2 => tokio_serial::StopBits::Two,
                _ => tokio_serial::StopBits::One,
            };

            let data_bits = match data_bits {
                5 => tokio_serial::DataBits::Five,
                6 => tokio_serial::DataBits::Six,
                7 => tokio_serial::DataBits::Seven,
                _ => tokio_serial::DataBits::Eight,
            };

            let builder = tokio_serial::new(path, *baud_rate)
                .parity(parity)
                .stop_bits(stop_bits)
                .data_bits(data_bits)
                .timeout(timeout);

            let serial = tokio_serial::SerialStream::open(&builder)
                .map_err(|e| DeviceError::Connection(format!("serial open {} failed: {}", path, e)))?;

            debug!(path = %path, baud = baud_rate, "Serial transport open");
            Ok(Box::new(serial))
        }
    }
}
