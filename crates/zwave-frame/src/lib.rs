//! Z-Wave serial API link-layer framing.
//!
//! The controller and the host exchange two kinds of units on the UART:
//! - single control bytes (`ACK`, `NAK`, `CAN`) with no length or checksum
//! - data frames: `SOF`, a length byte, the message type, the function id,
//!   the payload, and a trailing XOR checksum
//!
//! This crate turns bytes into [`Frame`]s and back. It knows nothing about
//! what a function id means; that is the message layer's job.

pub mod code;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod serial_codec;

pub use code::ErrorCode;
pub use codec::{
    checksum, decode_frame, encode_frame, try_decode, DataFrame, Frame, FrameConfig, MessageType,
    ReadEvent, ACK, CAN, MAX_FRAME_LEN, MIN_DATA_FRAME_LEN, NAK, SOF,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use serial_codec::SerialCodec;
