use crate::code::ErrorCode;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The buffer ends before the frame does.
    #[error("truncated frame ({available} of {needed} bytes)")]
    Truncated { needed: usize, available: usize },

    /// The bytes do not form a frame.
    #[error("invalid frame: {0}")]
    Invalid(String),

    /// The trailing checksum does not match the frame contents.
    #[error("checksum mismatch (expected 0x{expected:02x}, got 0x{actual:02x})")]
    Checksum { expected: u8, actual: u8 },

    /// The payload does not fit in a single frame.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

impl FrameError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Truncated { .. } => ErrorCode::PacketFormatTruncated,
            Self::Invalid(_) => ErrorCode::PacketFormatInvalid,
            Self::Checksum { .. } => ErrorCode::PacketFormatChecksum,
            Self::PayloadTooLarge { .. } => ErrorCode::ArgumentInvalid,
            Self::Io(_) | Self::ConnectionClosed => ErrorCode::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
