use std::fmt;
use std::io;

use zwave_config::ConfigError;
use zwave_driver::DriverError;
use zwave_frame::{ErrorCode, FrameError};
use zwave_message::MessageError;
use zwave_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Open { source, .. } => {
            CliError::new(TRANSPORT_ERROR, format!("{context}: {source}"))
        }
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::InvalidSpec(_) => CliError::usage(format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

/// Exit code for a classified protocol error.
pub fn code_for(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::PacketFormatTruncated
        | ErrorCode::PacketFormatInvalid
        | ErrorCode::PacketFormatChecksum
        | ErrorCode::PacketFormatInvalidPayload
        | ErrorCode::DeserializationNotImplemented
        | ErrorCode::CcNotImplemented
        | ErrorCode::Arithmetic
        | ErrorCode::SecurityDecryptFailed
        | ErrorCode::Config => DATA_INVALID,
        ErrorCode::ArgumentInvalid => USAGE,
        ErrorCode::ControllerMessageTimeout | ErrorCode::ControllerNodeTimeout => TIMEOUT,
        ErrorCode::ControllerMessageDropped
        | ErrorCode::ControllerResponseNok
        | ErrorCode::ControllerCallbackNok
        | ErrorCode::Cancelled => FAILURE,
        ErrorCode::Io => TRANSPORT_ERROR,
        ErrorCode::DriverShutdown => INTERNAL,
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        other => CliError::new(code_for(other.code()), format!("{context}: {other}")),
    }
}

pub fn message_error(context: &str, err: MessageError) -> CliError {
    match err {
        MessageError::Frame(err) => frame_error(context, err),
        other => CliError::new(
            code_for(other.code()),
            format!("{context}: {} ({other})", other.code()),
        ),
    }
}

pub fn config_error(context: &str, err: ConfigError) -> CliError {
    CliError::new(code_for(err.code()), format!("{context}: {err}"))
}

pub fn driver_error(context: &str, err: DriverError) -> CliError {
    match err {
        DriverError::Transport(err) => transport_error(context, err),
        DriverError::Frame(err) => frame_error(context, err),
        DriverError::Message(err) => message_error(context, err),
        DriverError::Config(err) => config_error(context, err),
        other => CliError::new(
            code_for(other.code()),
            format!("{context}: {} ({other})", other.code()),
        ),
    }
}
