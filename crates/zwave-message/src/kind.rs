use std::fmt;

use serde::Serialize;
use zwave_frame::MessageType;

use crate::function::{FunctionId, MessageCategory};
use crate::registry::MessageOrigin;

/// The final concrete message variant, known before any field is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageKind {
    SendData,
    SendDataResponse,
    SendDataCallback,
    SendDataMulticast,
    SendDataMulticastResponse,
    SendDataMulticastCallback,
    SendDataAbort,
    ApplicationCommand,
    ApplicationUpdate,
    GetControllerVersion,
    GetControllerVersionResponse,
    GetSerialApiInitData,
    GetSerialApiInitDataResponse,
    GetControllerId,
    GetControllerIdResponse,
    GetNodeProtocolInfo,
    GetNodeProtocolInfoResponse,
    RequestNodeInfo,
    RequestNodeInfoResponse,
    GetRoutingInfo,
    GetRoutingInfoResponse,
    AssignReturnRoute,
    AssignReturnRouteResponse,
    AssignReturnRouteCallback,
    IsFailedNode,
    IsFailedNodeResponse,
    SoftReset,
}

impl MessageKind {
    pub const ALL: [Self; 27] = [
        Self::SendData,
        Self::SendDataResponse,
        Self::SendDataCallback,
        Self::SendDataMulticast,
        Self::SendDataMulticastResponse,
        Self::SendDataMulticastCallback,
        Self::SendDataAbort,
        Self::ApplicationCommand,
        Self::ApplicationUpdate,
        Self::GetControllerVersion,
        Self::GetControllerVersionResponse,
        Self::GetSerialApiInitData,
        Self::GetSerialApiInitDataResponse,
        Self::GetControllerId,
        Self::GetControllerIdResponse,
        Self::GetNodeProtocolInfo,
        Self::GetNodeProtocolInfoResponse,
        Self::RequestNodeInfo,
        Self::RequestNodeInfoResponse,
        Self::GetRoutingInfo,
        Self::GetRoutingInfoResponse,
        Self::AssignReturnRoute,
        Self::AssignReturnRouteResponse,
        Self::AssignReturnRouteCallback,
        Self::IsFailedNode,
        Self::IsFailedNodeResponse,
        Self::SoftReset,
    ];

    pub fn function_id(self) -> FunctionId {
        match self {
            Self::SendData | Self::SendDataResponse | Self::SendDataCallback => FunctionId::SendData,
            Self::SendDataMulticast
            | Self::SendDataMulticastResponse
            | Self::SendDataMulticastCallback => FunctionId::SendDataMulticast,
            Self::SendDataAbort => FunctionId::SendDataAbort,
            Self::ApplicationCommand => FunctionId::ApplicationCommand,
            Self::ApplicationUpdate => FunctionId::ApplicationUpdate,
            Self::GetControllerVersion | Self::GetControllerVersionResponse => {
                FunctionId::GetControllerVersion
            }
            Self::GetSerialApiInitData | Self::GetSerialApiInitDataResponse => {
                FunctionId::GetSerialApiInitData
            }
            Self::GetControllerId | Self::GetControllerIdResponse => FunctionId::GetControllerId,
            Self::GetNodeProtocolInfo | Self::GetNodeProtocolInfoResponse => {
                FunctionId::GetNodeProtocolInfo
            }
            Self::RequestNodeInfo | Self::RequestNodeInfoResponse => FunctionId::RequestNodeInfo,
            Self::GetRoutingInfo | Self::GetRoutingInfoResponse => FunctionId::GetRoutingInfo,
            Self::AssignReturnRoute
            | Self::AssignReturnRouteResponse
            | Self::AssignReturnRouteCallback => FunctionId::AssignReturnRoute,
            Self::IsFailedNode | Self::IsFailedNodeResponse => FunctionId::IsFailedNode,
            Self::SoftReset => FunctionId::SoftReset,
        }
    }

    pub fn category(self) -> MessageCategory {
        match self {
            Self::SendDataResponse
            | Self::SendDataMulticastResponse
            | Self::GetControllerVersionResponse
            | Self::GetSerialApiInitDataResponse
            | Self::GetControllerIdResponse
            | Self::GetNodeProtocolInfoResponse
            | Self::RequestNodeInfoResponse
            | Self::GetRoutingInfoResponse
            | Self::AssignReturnRouteResponse
            | Self::IsFailedNodeResponse => MessageCategory::Response,
            Self::SendDataCallback
            | Self::SendDataMulticastCallback
            | Self::AssignReturnRouteCallback => MessageCategory::Callback,
            _ => MessageCategory::Request,
        }
    }

    pub fn message_type(self) -> MessageType {
        match self.category() {
            MessageCategory::Response => MessageType::Response,
            MessageCategory::Request | MessageCategory::Callback => MessageType::Request,
        }
    }

    /// Which side of the link sends this variant.
    pub fn origin(self) -> MessageOrigin {
        match self {
            Self::ApplicationCommand | Self::ApplicationUpdate => MessageOrigin::Controller,
            _ if self.category() == MessageCategory::Request => MessageOrigin::Host,
            _ => MessageOrigin::Controller,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.function_id(), self.category())
    }
}
