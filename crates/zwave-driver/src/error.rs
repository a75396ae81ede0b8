use zwave_cc::NodeId;
use zwave_config::ConfigError;
use zwave_frame::{ErrorCode, FrameError};
use zwave_message::{MessageError, MessageKind, TransmitStatus};
use zwave_transport::TransportError;

/// Which reply never arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ack,
    Response,
    Callback,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ack => "ACK",
            Self::Response => "response",
            Self::Callback => "callback",
        })
    }
}

/// Errors surfaced by the transaction engine and the driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The controller did not answer in time.
    #[error("timed out waiting for the controller {0}")]
    MessageTimeout(Stage),

    /// The controller accepted the frame but the node never replied.
    #[error("timed out waiting for a report from node {0}")]
    NodeTimeout(NodeId),

    /// The controller answered with an explicit failure.
    #[error("{kind} was rejected by the controller")]
    ResponseNok { kind: MessageKind },

    /// The transmission completed with a failure status.
    #[error("{kind} failed{}", .status.map(|s| format!(" with {s}")).unwrap_or_default())]
    CallbackNok {
        kind: MessageKind,
        status: Option<TransmitStatus>,
    },

    /// The queue gave up on a transaction without sending it to completion.
    #[error("message dropped: {0}")]
    Dropped(String),

    /// The target node went to sleep while its transaction was in flight.
    #[error("node {0} fell asleep")]
    NodeAsleep(NodeId),

    #[error("transaction cancelled")]
    Cancelled,

    #[error("driver shut down")]
    Shutdown,
}

impl DriverError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Message(err) => err.code(),
            Self::Frame(err) => err.code(),
            Self::Transport(_) => ErrorCode::Io,
            Self::Config(err) => err.code(),
            Self::MessageTimeout(_) => ErrorCode::ControllerMessageTimeout,
            Self::NodeTimeout(_) => ErrorCode::ControllerNodeTimeout,
            Self::ResponseNok { .. } => ErrorCode::ControllerResponseNok,
            Self::CallbackNok { .. } => ErrorCode::ControllerCallbackNok,
            Self::Dropped(_) | Self::NodeAsleep(_) => ErrorCode::ControllerMessageDropped,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Shutdown => ErrorCode::DriverShutdown,
        }
    }

    /// Nothing came back: the node or the controller is unreachable.
    pub fn is_no_response(&self) -> bool {
        match self {
            Self::MessageTimeout(_) | Self::NodeTimeout(_) => true,
            Self::CallbackNok { status, .. } => matches!(
                status,
                Some(TransmitStatus::NoAck | TransmitStatus::NoRoute) | None
            ),
            _ => false,
        }
    }

    /// An answer came back and it said no.
    pub fn is_negative_response(&self) -> bool {
        match self {
            Self::ResponseNok { .. } => true,
            Self::CallbackNok { .. } => !self.is_no_response(),
            _ => false,
        }
    }

    /// Worth another SendData attempt.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MessageTimeout(Stage::Response | Stage::Callback)
                | Self::ResponseNok { .. }
                | Self::CallbackNok { .. }
        )
    }

    /// Counts against the target node rather than the controller.
    pub(crate) fn implicates_node(&self) -> bool {
        match self {
            Self::NodeTimeout(_) | Self::MessageTimeout(Stage::Callback) => true,
            Self::CallbackNok { status, .. } => {
                matches!(status, Some(TransmitStatus::NoAck | TransmitStatus::NoRoute))
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, DriverError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_response_and_negative_are_disjoint() {
        let cases = [
            DriverError::MessageTimeout(Stage::Callback),
            DriverError::NodeTimeout(4),
            DriverError::ResponseNok {
                kind: MessageKind::SendDataResponse,
            },
            DriverError::CallbackNok {
                kind: MessageKind::SendDataCallback,
                status: Some(TransmitStatus::NoAck),
            },
            DriverError::CallbackNok {
                kind: MessageKind::SendDataCallback,
                status: Some(TransmitStatus::Fail),
            },
            DriverError::Cancelled,
        ];
        let flags: Vec<_> = cases
            .iter()
            .map(|err| (err.is_no_response(), err.is_negative_response()))
            .collect();
        assert_eq!(
            flags,
            vec![
                (true, false),
                (true, false),
                (false, true),
                (true, false),
                (false, true),
                (false, false)
            ]
        );
    }

    #[test]
    fn codes() {
        assert_eq!(
            DriverError::NodeTimeout(2).code(),
            ErrorCode::ControllerNodeTimeout
        );
        assert_eq!(
            DriverError::NodeAsleep(2).code(),
            ErrorCode::ControllerMessageDropped
        );
        assert_eq!(
            DriverError::MessageTimeout(Stage::Ack).to_string(),
            "timed out waiting for the controller ACK"
        );
    }

    #[test]
    fn only_link_level_failures_skip_retry() {
        assert!(!DriverError::MessageTimeout(Stage::Ack).is_retryable());
        assert!(DriverError::MessageTimeout(Stage::Callback).is_retryable());
        assert!(!DriverError::NodeTimeout(3).is_retryable());
    }
}
