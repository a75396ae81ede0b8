use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::error::{FrameError, Result};

/// Start of a data frame.
pub const SOF: u8 = 0x01;
/// Positive link-level acknowledgement.
pub const ACK: u8 = 0x06;
/// Negative link-level acknowledgement (checksum or format failure).
pub const NAK: u8 = 0x15;
/// Collision: the other side was sending at the same time.
pub const CAN: u8 = 0x18;

/// SOF + length + type + function id + checksum.
pub const MIN_DATA_FRAME_LEN: usize = 5;

/// The length byte covers type, function id, payload and checksum.
const LEN_OVERHEAD: usize = 3;

/// Largest frame the one-byte length field can describe.
pub const MAX_FRAME_LEN: usize = u8::MAX as usize + 2;

/// Largest payload that fits behind type and function id.
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - LEN_OVERHEAD;

/// Direction discriminant carried by every data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageType {
    Request = 0x00,
    Response = 0x01,
}

impl TryFrom<u8> for MessageType {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Request),
            0x01 => Ok(Self::Response),
            other => Err(FrameError::Invalid(format!(
                "unknown message type 0x{other:02x}"
            ))),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("REQ"),
            Self::Response => f.write_str("RES"),
        }
    }
}

/// The body of a SOF frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame {
    pub message_type: MessageType,
    pub function_id: u8,
    pub payload: Bytes,
}

/// One unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Ack,
    Nak,
    Can,
    Data(DataFrame),
}

impl Frame {
    /// Build a request data frame.
    pub fn request(function_id: u8, payload: impl Into<Bytes>) -> Self {
        Self::data(MessageType::Request, function_id, payload)
    }

    /// Build a response data frame.
    pub fn response(function_id: u8, payload: impl Into<Bytes>) -> Self {
        Self::data(MessageType::Response, function_id, payload)
    }

    pub fn data(message_type: MessageType, function_id: u8, payload: impl Into<Bytes>) -> Self {
        Self::Data(DataFrame {
            message_type,
            function_id,
            payload: payload.into(),
        })
    }

    /// Whether this is one of the single-byte control frames.
    pub fn is_control(&self) -> bool {
        !matches!(self, Self::Data(_))
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        match self {
            Self::Data(data) => MIN_DATA_FRAME_LEN + data.payload.len(),
            _ => 1,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack => f.write_str("ACK"),
            Self::Nak => f.write_str("NAK"),
            Self::Can => f.write_str("CAN"),
            Self::Data(data) => write!(
                f,
                "{} 0x{:02x} [{} bytes]",
                data.message_type,
                data.function_id,
                data.payload.len()
            ),
        }
    }
}

/// What the streaming decoder produced from the front of a buffer.
#[derive(Debug)]
pub enum ReadEvent {
    /// A well-formed frame.
    Frame(Frame),
    /// A complete SOF frame whose checksum failed. The link answers with NAK.
    Corrupt(FrameError),
    /// Bytes that could not start any frame and were skipped.
    Discarded(Bytes),
}

/// XOR of all bytes, seeded with 0xFF.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0xFF, |acc, b| acc ^ b)
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬──────┬──────┬──────────┬─────────────┬──────────┐
/// │ SOF  │ Len  │ Type │ Function │ Payload     │ Checksum │
/// │ 0x01 │ (1B) │ (1B) │ (1B)     │ (Len-3 B)   │ (1B)     │
/// └──────┴──────┴──────┴──────────┴─────────────┴──────────┘
/// ```
/// Control frames are a single byte: `0x06` ACK, `0x15` NAK, `0x18` CAN.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let data = match frame {
        Frame::Ack => {
            dst.put_u8(ACK);
            return Ok(());
        }
        Frame::Nak => {
            dst.put_u8(NAK);
            return Ok(());
        }
        Frame::Can => {
            dst.put_u8(CAN);
            return Ok(());
        }
        Frame::Data(data) => data,
    };

    if data.payload.len() > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: data.payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    dst.reserve(MIN_DATA_FRAME_LEN + data.payload.len());
    let start = dst.len();
    dst.put_u8(SOF);
    dst.put_u8((data.payload.len() + LEN_OVERHEAD) as u8);
    dst.put_u8(data.message_type as u8);
    dst.put_u8(data.function_id);
    dst.put_slice(&data.payload);
    let sum = checksum(&dst[start + 1..]);
    dst.put_u8(sum);
    Ok(())
}

/// Decode exactly one frame from the front of `src`.
///
/// Returns the frame and the number of bytes it occupied. This is the strict
/// form: an incomplete frame is an error, not a request for more data.
pub fn decode_frame(src: &[u8]) -> Result<(Frame, usize)> {
    let first = *src.first().ok_or(FrameError::Truncated {
        needed: 1,
        available: 0,
    })?;

    match first {
        ACK => return Ok((Frame::Ack, 1)),
        NAK => return Ok((Frame::Nak, 1)),
        CAN => return Ok((Frame::Can, 1)),
        SOF => {}
        other => {
            return Err(FrameError::Invalid(format!(
                "expected SOF, got 0x{other:02x}"
            )))
        }
    }

    if src.len() < MIN_DATA_FRAME_LEN {
        return Err(FrameError::Truncated {
            needed: MIN_DATA_FRAME_LEN,
            available: src.len(),
        });
    }

    let len = src[1] as usize;
    if len < LEN_OVERHEAD {
        return Err(FrameError::Invalid(format!("length byte {len} too small")));
    }

    let total = len + 2;
    if src.len() < total {
        return Err(FrameError::Truncated {
            needed: total,
            available: src.len(),
        });
    }

    let expected = checksum(&src[1..total - 1]);
    let actual = src[total - 1];
    if expected != actual {
        return Err(FrameError::Checksum { expected, actual });
    }

    let message_type = MessageType::try_from(src[2])?;
    let function_id = src[3];
    let payload = Bytes::copy_from_slice(&src[4..total - 1]);

    Ok((
        Frame::Data(DataFrame {
            message_type,
            function_id,
            payload,
        }),
        total,
    ))
}

/// Decode the next unit from a receive buffer.
///
/// Returns `None` if the buffer doesn't contain a complete frame yet. On
/// success, consumes the decoded (or skipped) bytes from the buffer.
pub fn try_decode(src: &mut BytesMut) -> Option<ReadEvent> {
    let first = *src.first()?;

    if !matches!(first, SOF | ACK | NAK | CAN) {
        let skip = src
            .iter()
            .position(|b| matches!(*b, SOF | ACK | NAK | CAN))
            .unwrap_or(src.len());
        let garbage = src.split_to(skip).freeze();
        trace!(bytes = ?garbage.as_ref(), "discarding bytes outside any frame");
        return Some(ReadEvent::Discarded(garbage));
    }

    match decode_frame(src) {
        Ok((frame, consumed)) => {
            src.advance(consumed);
            Some(ReadEvent::Frame(frame))
        }
        Err(FrameError::Truncated { .. }) => None,
        Err(err @ FrameError::Checksum { .. }) => {
            let total = src[1] as usize + 2;
            src.advance(total);
            Some(ReadEvent::Corrupt(err))
        }
        Err(_) => {
            // Not a frame after all; drop the SOF and rescan from the next byte.
            let garbage = src.split_to(1).freeze();
            Some(ReadEvent::Discarded(garbage))
        }
    }
}

/// Configuration for frame readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: the largest the length byte allows.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: MAX_PAYLOAD_LEN,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
