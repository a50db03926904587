//! Framed message protocol for site controllers.
//!
//! A [`DeviceSession`] speaks the controller's binary protocol over either a
//! TCP socket or a serial line:
//!
//! ```text
//! 0x7E | type:u8 | seq:u16 | len:u16 | payload (JSON, len bytes) | crc32:u32
//! ```
//!
//! All integers are big-endian. The CRC covers everything between the start
//! marker and the checksum. Requests carry a sequence number which the
//! controller echoes in its response; pushed messages (metrics, status,
//! alerts) use sequence 0 and are delivered as
//! [`DeviceEvent`](sitelink_common::DeviceEvent)s.

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod transport;

pub use codec::{Frame, FrameDecoder, FrameError};
pub use config::{ConnectionConfig, DeviceSessionConfig};
pub use error::{DeviceError, Result};
pub use protocol::{Message, MessageType, StatusPayload};
pub use session::DeviceSession;
pub use transport::ByteStream;
