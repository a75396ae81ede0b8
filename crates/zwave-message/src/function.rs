use std::fmt;

use serde::Serialize;

/// Serial API function ids this stack understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u8)]
pub enum FunctionId {
    GetSerialApiInitData = 0x02,
    ApplicationCommand = 0x04,
    SoftReset = 0x08,
    SendData = 0x13,
    SendDataMulticast = 0x14,
    GetControllerVersion = 0x15,
    SendDataAbort = 0x16,
    GetControllerId = 0x20,
    GetNodeProtocolInfo = 0x41,
    AssignReturnRoute = 0x46,
    ApplicationUpdate = 0x49,
    RequestNodeInfo = 0x60,
    IsFailedNode = 0x62,
    GetRoutingInfo = 0x80,
}

impl FunctionId {
    pub const ALL: [Self; 14] = [
        Self::GetSerialApiInitData,
        Self::ApplicationCommand,
        Self::SoftReset,
        Self::SendData,
        Self::SendDataMulticast,
        Self::GetControllerVersion,
        Self::SendDataAbort,
        Self::GetControllerId,
        Self::GetNodeProtocolInfo,
        Self::AssignReturnRoute,
        Self::ApplicationUpdate,
        Self::RequestNodeInfo,
        Self::IsFailedNode,
        Self::GetRoutingInfo,
    ];

    pub fn from_u8(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|f| *f as u8 == id)
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::GetSerialApiInitData => "GetSerialApiInitData",
            Self::ApplicationCommand => "ApplicationCommand",
            Self::SoftReset => "SoftReset",
            Self::SendData => "SendData",
            Self::SendDataMulticast => "SendDataMulticast",
            Self::GetControllerVersion => "GetControllerVersion",
            Self::SendDataAbort => "SendDataAbort",
            Self::GetControllerId => "GetControllerId",
            Self::GetNodeProtocolInfo => "GetNodeProtocolInfo",
            Self::AssignReturnRoute => "AssignReturnRoute",
            Self::ApplicationUpdate => "ApplicationUpdate",
            Self::RequestNodeInfo => "RequestNodeInfo",
            Self::IsFailedNode => "IsFailedNode",
            Self::GetRoutingInfo => "GetRoutingInfo",
        }
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a message relates to the exchange it belongs to.
///
/// On the wire there are only requests and responses; a callback is a
/// request sent by the controller that completes an earlier host request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    Request,
    Response,
    Callback,
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Callback => "callback",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip() {
        for function in FunctionId::ALL {
            assert_eq!(FunctionId::from_u8(function.as_u8()), Some(function));
        }
        assert_eq!(FunctionId::from_u8(0x13), Some(FunctionId::SendData));
        assert_eq!(FunctionId::from_u8(0xEE), None);
    }
}
