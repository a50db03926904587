//! Typed protocol messages carried inside frames.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use sitelink_common::{AlertEvent, DeviceStatusReport, Metric, MetricType};

use crate::codec::{Frame, FrameError};

/// Message type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    MetricsRequest = 0x01,
    MetricsResponse = 0x02,
    StatusRequest = 0x03,
    StatusResponse = 0x04,
    MetricsPush = 0x05,
    Alert = 0x06,
    Command = 0x07,
    CommandResult = 0x08,
    StatusPush = 0x09,
    Heartbeat = 0x0A,
    Nack = 0x0F,
}

impl MessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::MetricsRequest),
            0x02 => Some(Self::MetricsResponse),
            0x03 => Some(Self::StatusRequest),
            0x04 => Some(Self::StatusResponse),
            0x05 => Some(Self::MetricsPush),
            0x06 => Some(Self::Alert),
            0x07 => Some(Self::Command),
            0x08 => Some(Self::CommandResult),
            0x09 => Some(Self::StatusPush),
            0x0A => Some(Self::Heartbeat),
            0x0F => Some(Self::Nack),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MetricsRequest => "metrics_request",
            Self::MetricsResponse => "metrics_response",
            Self::StatusRequest => "status_request",
            Self::StatusResponse => "status_response",
            Self::MetricsPush => "metrics_push",
            Self::Alert => "alert",
            Self::Command => "command",
            Self::CommandResult => "command_result",
            Self::StatusPush => "status_push",
            Self::Heartbeat => "heartbeat",
            Self::Nack => "nack",
        }
    }
}

/// Ask the controller for metrics; an empty filter means "everything".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsRequest {
    #[serde(default)]
    pub filter: Vec<MetricType>,
}

/// A set of readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsPayload {
    #[serde(default)]
    pub metrics: Vec<Metric>,
}

/// Controller status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusPayload {
    pub state: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uptime_secs: Option<u64>,

    #[serde(default)]
    pub active_alarms: u32,
}

impl From<StatusPayload> for DeviceStatusReport {
    fn from(payload: StatusPayload) -> Self {
        DeviceStatusReport {
            status: payload.state,
            message: payload.message,
            firmware_version: payload.firmware_version,
            uptime_secs: payload.uptime_secs,
        }
    }
}

/// Command dispatched to the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandPayload {
    pub command_id: i64,
    pub command_type: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Controller's answer to a [`CommandPayload`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResultPayload {
    pub command_id: i64,
    pub success: bool,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub return_code: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Negative acknowledgement for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NackPayload {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    MetricsRequest(MetricsRequest),
    MetricsResponse(MetricsPayload),
    StatusRequest,
    StatusResponse(StatusPayload),
    MetricsPush(MetricsPayload),
    StatusPush(StatusPayload),
    Alert(AlertEvent),
    Command(CommandPayload),
    CommandResult(CommandResultPayload),
    Heartbeat,
    Nack(NackPayload),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Message::MetricsRequest(_) => MessageType::MetricsRequest,
            Message::MetricsResponse(_) => MessageType::MetricsResponse,
            Message::StatusRequest => MessageType::StatusRequest,
            Message::StatusResponse(_) => MessageType::StatusResponse,
            Message::MetricsPush(_) => MessageType::MetricsPush,
            Message::StatusPush(_) => MessageType::StatusPush,
            Message::Alert(_) => MessageType::Alert,
            Message::Command(_) => MessageType::Command,
            Message::CommandResult(_) => MessageType::CommandResult,
            Message::Heartbeat => MessageType::Heartbeat,
            Message::Nack(_) => MessageType::Nack,
        }
    }

    /// True for messages that answer a request (matched by sequence number).
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            Message::MetricsResponse(_)
                | Message::StatusResponse(_)
                | Message::CommandResult(_)
                | Message::Nack(_)
        )
    }

    /// Wrap the message in a frame with the given sequence number.
    pub fn to_frame(&self, seq: u16) -> Result<Frame, FrameError> {
        let msg_type = self.message_type();
        let payload = match self {
            Message::StatusRequest | Message::Heartbeat => Vec::new(),
            Message::MetricsRequest(p) => to_json(msg_type, p)?,
            Message::MetricsResponse(p) | Message::MetricsPush(p) => to_json(msg_type, p)?,
            Message::StatusResponse(p) | Message::StatusPush(p) => to_json(msg_type, p)?,
            Message::Alert(p) => to_json(msg_type, p)?,
            Message::Command(p) => to_json(msg_type, p)?,
            Message::CommandResult(p) => to_json(msg_type, p)?,
            Message::Nack(p) => to_json(msg_type, p)?,
        };
        Ok(Frame::new(msg_type as u8, seq, payload))
    }

    /// Decode the payload of a frame.
    pub fn from_frame(frame: &Frame) -> Result<Self, FrameError> {
        let msg_type =
            MessageType::from_u8(frame.msg_type).ok_or(FrameError::UnknownType(frame.msg_type))?;
        let payload = &frame.payload[..];

        let message = match msg_type {
            MessageType::MetricsRequest => Message::MetricsRequest(from_json(msg_type, payload)?),
            MessageType::MetricsResponse => {
                Message::MetricsResponse(from_json(msg_type, payload)?)
            }
            MessageType::StatusRequest => Message::StatusRequest,
            MessageType::StatusResponse => Message::StatusResponse(from_json(msg_type, payload)?),
            MessageType::MetricsPush => Message::MetricsPush(from_json(msg_type, payload)?),
            MessageType::StatusPush => Message::StatusPush(from_json(msg_type, payload)?),
            MessageType::Alert => Message::Alert(from_json(msg_type, payload)?),
            MessageType::Command => Message::Command(from_json(msg_type, payload)?),
            MessageType::CommandResult => Message::CommandResult(from_json(msg_type, payload)?),
            MessageType::Heartbeat => Message::Heartbeat,
            MessageType::Nack => Message::Nack(from_json(msg_type, payload)?),
        };
        Ok(message)
    }
}

fn to_json<T: Serialize>(msg_type: MessageType, value: &T) -> Result<Vec<u8>, FrameError> {
    serde_json::to_vec(value).map_err(|e| FrameError::Payload {
        message: msg_type.as_str(),
        reason: e.to_string(),
    })
}

fn from_json<T: DeserializeOwned>(msg_type: MessageType, payload: &[u8]) -> Result<T, FrameError> {
    serde_json::from_slice(payload).map_err(|e| FrameError::Payload {
        message: msg_type.as_str(),
        reason: e.to_string(),
    })
}
