use zwave_frame::ErrorCode;

/// Errors produced while decoding or encoding command classes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CcError {
    /// The command class, or this command of it, is not implemented.
    #[error("command class 0x{cc_id:02x} command {command:?} is not implemented")]
    NotImplemented { cc_id: u16, command: Option<u8> },

    /// A payload assertion failed: too short, or a field out of range.
    #[error("invalid CC payload: {0}")]
    InvalidPayload(String),

    /// A value does not fit in the available byte width.
    #[error("value out of range: {0}")]
    Arithmetic(String),

    /// The caller built a command that cannot be serialized.
    #[error("invalid argument: {0}")]
    Argument(String),

    /// The security layer could not decrypt or authenticate a payload.
    #[error("security decapsulation failed: {0}")]
    Decrypt(String),

    /// A message-level decode failure surfaced while merging partial reports.
    #[error("deserialization not implemented: {0}")]
    DeserializationNotImplemented(String),
}

impl CcError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotImplemented { .. } => ErrorCode::CcNotImplemented,
            Self::InvalidPayload(_) => ErrorCode::PacketFormatInvalidPayload,
            Self::Arithmetic(_) => ErrorCode::Arithmetic,
            Self::Argument(_) => ErrorCode::ArgumentInvalid,
            Self::Decrypt(_) => ErrorCode::SecurityDecryptFailed,
            Self::DeserializationNotImplemented(_) => ErrorCode::DeserializationNotImplemented,
        }
    }

    /// Errors that abandon a partial-report merge without failing the caller.
    pub fn is_soft_merge_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::DeserializationNotImplemented
                | ErrorCode::CcNotImplemented
                | ErrorCode::PacketFormatInvalidPayload
        )
    }

    pub(crate) fn not_implemented(cc_id: u16, command: Option<u8>) -> Self {
        Self::NotImplemented { cc_id, command }
    }
}

pub type Result<T> = std::result::Result<T, CcError>;
