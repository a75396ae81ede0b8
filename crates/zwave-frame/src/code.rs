//! Flat error classification shared by every layer of the stack.
//!
//! Each crate has its own error enum, but callers that only care about
//! "what went wrong, in protocol terms" can match on [`ErrorCode`].

use std::fmt;

/// Protocol-level error classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The buffer ends before the frame does.
    PacketFormatTruncated,
    /// The bytes do not form a frame at all.
    PacketFormatInvalid,
    /// The frame checksum does not match.
    PacketFormatChecksum,
    /// A command class payload violates its length or range constraints.
    PacketFormatInvalidPayload,
    /// No message variant is registered for this function id.
    DeserializationNotImplemented,
    /// The command class (or command) is not implemented.
    CcNotImplemented,
    /// The caller constructed something invalid.
    ArgumentInvalid,
    /// A value does not fit in the available byte width.
    Arithmetic,
    /// Security decapsulation failed.
    SecurityDecryptFailed,
    /// No ACK, response or callback within the deadline.
    ControllerMessageTimeout,
    /// The node did not answer within the deadline.
    ControllerNodeTimeout,
    /// The transaction was given up at queue level.
    ControllerMessageDropped,
    /// The controller answered with an explicit negative response.
    ControllerResponseNok,
    /// The callback reported a failed transmission.
    ControllerCallbackNok,
    /// The caller cancelled the transaction.
    Cancelled,
    /// The driver is no longer running.
    DriverShutdown,
    /// Configuration could not be loaded or validated.
    Config,
    /// Underlying I/O failure.
    Io,
}

impl ErrorCode {
    /// Decode-side errors that only cost the offending unit; the link stays usable.
    pub fn is_recoverable_decode_error(self) -> bool {
        matches!(
            self,
            Self::PacketFormatTruncated
                | Self::PacketFormatInvalid
                | Self::PacketFormatChecksum
                | Self::PacketFormatInvalidPayload
                | Self::DeserializationNotImplemented
                | Self::CcNotImplemented
        )
    }

    /// Stable name used in logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PacketFormatTruncated => "PacketFormat_Truncated",
            Self::PacketFormatInvalid => "PacketFormat_Invalid",
            Self::PacketFormatChecksum => "PacketFormat_Checksum",
            Self::PacketFormatInvalidPayload => "PacketFormat_InvalidPayload",
            Self::DeserializationNotImplemented => "Deserialization_NotImplemented",
            Self::CcNotImplemented => "CC_NotImplemented",
            Self::ArgumentInvalid => "Argument_Invalid",
            Self::Arithmetic => "Arithmetic",
            Self::SecurityDecryptFailed => "Security_DecryptFailed",
            Self::ControllerMessageTimeout => "Controller_MessageTimeout",
            Self::ControllerNodeTimeout => "Controller_NodeTimeout",
            Self::ControllerMessageDropped => "Controller_MessageDropped",
            Self::ControllerResponseNok => "Controller_ResponseNOK",
            Self::ControllerCallbackNok => "Controller_CallbackNOK",
            Self::Cancelled => "Cancelled",
            Self::DriverShutdown => "Driver_Shutdown",
            Self::Config => "Config",
            Self::Io => "IO",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
