use zwave_cc::CcError;
use zwave_frame::{ErrorCode, FrameError, MessageType};

/// Errors that can occur while decoding or encoding messages.
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The carried command class could not be decoded or encoded.
    #[error("command class error: {0}")]
    Cc(#[from] CcError),

    /// No message variant is registered for this function id.
    #[error("no {message_type} message registered for function 0x{function_id:02x}")]
    NotImplemented {
        message_type: MessageType,
        function_id: u8,
    },

    /// The message payload is too short or holds out-of-range fields.
    #[error("invalid message payload: {0}")]
    InvalidPayload(String),

    /// The caller built a message that cannot be sent.
    #[error("invalid argument: {0}")]
    Argument(String),
}

impl MessageError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Frame(err) => err.code(),
            Self::Cc(err) => err.code(),
            Self::NotImplemented { .. } => ErrorCode::DeserializationNotImplemented,
            Self::InvalidPayload(_) => ErrorCode::PacketFormatInvalidPayload,
            Self::Argument(_) => ErrorCode::ArgumentInvalid,
        }
    }

    /// Decode failures that cost only this message.
    pub fn is_recoverable(&self) -> bool {
        self.code().is_recoverable_decode_error()
            || matches!(self, Self::Cc(CcError::Decrypt(_)))
    }
}

pub type Result<T> = std::result::Result<T, MessageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_the_taxonomy() {
        let err = MessageError::NotImplemented {
            message_type: MessageType::Request,
            function_id: 0xEE,
        };
        assert_eq!(err.code(), ErrorCode::DeserializationNotImplemented);
        assert!(err.is_recoverable());

        let err = MessageError::Argument("callback id not set".into());
        assert_eq!(err.code(), ErrorCode::ArgumentInvalid);
        assert!(!err.is_recoverable());

        let err = MessageError::from(CcError::Decrypt("bad mac".into()));
        assert_eq!(err.code(), ErrorCode::SecurityDecryptFailed);
        assert!(err.is_recoverable());
    }
}
