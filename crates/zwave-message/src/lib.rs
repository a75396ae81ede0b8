//! Z-Wave serial API messages.
//!
//! A [`DataFrame`](zwave_frame::DataFrame) becomes a [`Message`] in two
//! steps. The registry maps (message type, function id, origin) to a
//! [`MessageKind`]; the kind then decodes its fields directly. Because
//! the controller reuses Request frames with the same function id for
//! callbacks, the origin is part of the lookup key.
//!
//! Each message also describes what it waits for: an [`Expectation`] for
//! the controller response, another for the callback, and whether a node
//! report completes the exchange. The driver drives its transaction state
//! machine off these answers.

pub mod error;
pub mod expect;
pub mod function;
pub mod kind;
pub mod message;
pub mod messages;
pub mod priority;
pub mod registry;

pub use error::{MessageError, Result};
pub use expect::{Expectation, MatchFn};
pub use function::{FunctionId, MessageCategory};
pub use kind::MessageKind;
pub use message::{Message, MessageContext};
pub use messages::{
    ApplicationCommandRequest, ApplicationUpdateRequest, AssignReturnRouteRequest, ControllerId,
    ControllerVersion, GetRoutingInfoRequest, NodeInfo, NodeProtocolInfo, RoutingInfo,
    SendDataMulticastRequest, SendDataRequest, SerialApiInitData, TransmitReport,
    TransmitResponse, TransmitStatus, UpdateKind, DEFAULT_SEND_ATTEMPTS, MAX_SEND_ATTEMPTS,
};
pub use priority::MessagePriority;
pub use registry::{classify, MessageOrigin};
