//! Frame encoding and a resynchronizing stream decoder.

use bytes::{Buf, Bytes, BytesMut};
use thiserror::Error;

/// Marks the start of every frame.
pub const FRAME_START: u8 = 0x7E;

/// Start marker + type + seq + len.
pub const HEADER_LEN: usize = 6;

const CRC_LEN: usize = 4;

/// Largest payload the decoder accepts.
pub const MAX_PAYLOAD: usize = 16 * 1024;

/// Errors produced while encoding or decoding frames.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD} byte limit")]
    PayloadTooLarge(usize),

    #[error("checksum mismatch (expected 0x{expected:08X}, computed 0x{actual:08X})")]
    Checksum { expected: u32, actual: u32 },

    #[error("incomplete frame of {0} bytes abandoned for a later frame")]
    Truncated(usize),

    #[error("unknown message type 0x{0:02X}")]
    UnknownType(u8),

    #[error("invalid payload for {message}: {reason}")]
    Payload {
        message: &'static str,
        reason: String,
    },
}

/// One raw protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: u8,
    pub seq: u16,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(msg_type: u8, seq: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            msg_type,
            seq,
            payload: payload.into(),
        }
    }

    /// Serialize the frame to wire bytes.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        if self.payload.len() > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge(self.payload.len()));
        }

        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len() + CRC_LEN);
        out.push(FRAME_START);
        out.push(self.msg_type);
        out.extend_from_slice(&self.seq.to_be_bytes());
        out.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.payload);

        let crc = crc32fast::hash(&out[1..]);
        out.extend_from_slice(&crc.to_be_bytes());

        Ok(out)
    }
}

/// Incremental decoder for a byte stream of frames.
///
/// Works for both packet-oriented (TCP) and byte-oriented (serial) input:
/// bytes are appended with [`extend`](Self::extend) and complete frames are
/// pulled with [`decode_next`](Self::decode_next). Garbage before a start
/// marker is discarded; a frame that fails validation costs exactly one byte
/// before the decoder searches for the next marker. An incomplete frame is
/// abandoned as soon as a complete, valid frame starts later in the buffer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
    discarded: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Bytes dropped while hunting for frame boundaries.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Bytes waiting for the rest of a frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Pull the next frame out of the buffer.
    ///
    /// Returns `None` when more input is needed, `Some(Err(_))` when a
    /// candidate frame was rejected (the decoder has already moved past it).
    pub fn decode_next(&mut self) -> Option<Result<Frame, FrameError>> {
        match self.buf.iter().position(|b| *b == FRAME_START) {
            None => {
                self.discarded += self.buf.len() as u64;
                self.buf.clear();
                return None;
            }
            Some(0) => {}
            Some(pos) => {
                self.discarded += pos as u64;
                self.buf.advance(pos);
            }
        }

        if self.buf.len() < HEADER_LEN {
            return None;
        }

        let msg_type = self.buf[1];
        let seq = u16::from_be_bytes([self.buf[2], self.buf[3]]);
        let len = u16::from_be_bytes([self.buf[4], self.buf[5]]) as usize;

        if len > MAX_PAYLOAD {
            self.skip_marker();
            return Some(Err(FrameError::PayloadTooLarge(len)));
        }

        let body_end = HEADER_LEN + len;
        let total = body_end + CRC_LEN;
        if self.buf.len() < total {
            let pos = self.next_complete_frame()?;
            self.buf.advance(pos);
            self.discarded += pos as u64;
            return Some(Err(FrameError::Truncated(pos)));
        }

        let expected = u32::from_be_bytes([
            self.buf[body_end],
            self.buf[body_end + 1],
            self.buf[body_end + 2],
            self.buf[body_end + 3],
        ]);
        let actual = crc32fast::hash(&self.buf[1..body_end]);
        if expected != actual {
            self.skip_marker();
            return Some(Err(FrameError::Checksum { expected, actual }));
        }

        let frame = self.buf.split_to(total).freeze();
        Some(Ok(Frame {
            msg_type,
            seq,
            payload: frame.slice(HEADER_LEN..body_end),
        }))
    }

    /// Offset of the first later marker that starts a complete frame with a
    /// matching checksum.
    fn next_complete_frame(&self) -> Option<usize> {
        (1..self.buf.len())
            .filter(|&pos| self.buf[pos] == FRAME_START)
            .find(|&pos| is_complete_frame(&self.buf[pos..]))
    }

    fn skip_marker(&mut self) {
        self.buf.advance(1);
        self.discarded += 1;
    }
}

fn is_complete_frame(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_LEN {
        return false;
    }
    let len = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
    let body_end = HEADER_LEN + len;
    if len > MAX_PAYLOAD || bytes.len() < body_end + CRC_LEN {
        return false;
    }
    let expected = u32::from_be_bytes([
        bytes[body_end],
        bytes[body_end + 1],
        bytes[body_end + 2],
        bytes[body_end + 3],
    ]);
    crc32fast::hash(&bytes[1..body_end]) == expected
}
