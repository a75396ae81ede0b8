//! Typed bodies of the concrete messages.

pub mod application;
pub mod controller;
pub mod node;
pub mod send_data;
pub mod transmit;

pub use application::{ApplicationCommandRequest, ApplicationUpdateRequest, NodeInfo, UpdateKind};
pub use controller::{ControllerId, ControllerVersion, SerialApiInitData};
pub use node::{AssignReturnRouteRequest, GetRoutingInfoRequest, NodeProtocolInfo, RoutingInfo};
pub use send_data::{
    SendDataMulticastRequest, SendDataRequest, DEFAULT_SEND_ATTEMPTS, MAX_SEND_ATTEMPTS,
};
pub use transmit::{TransmitReport, TransmitResponse, TransmitStatus};
