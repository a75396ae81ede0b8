use std::fmt;

use bytes::BytesMut;
use serde::Serialize;
use tracing::trace;
use zwave_cc::cc::security::SecurityCommand;
use zwave_cc::cc::supervision::SupervisionCommand;
use zwave_cc::{CcContext, Command, CommandClass, NodeId};
use zwave_frame::{decode_frame, encode_frame, DataFrame, Frame, FrameError, MessageType};

use crate::error::{MessageError, Result};
use crate::expect::Expectation;
use crate::function::{FunctionId, MessageCategory};
use crate::kind::MessageKind;
use crate::messages::node::parse_node_id;
use crate::messages::transmit::parse_flag;
use crate::messages::{
    ApplicationCommandRequest, ApplicationUpdateRequest, AssignReturnRouteRequest, ControllerId,
    ControllerVersion, GetRoutingInfoRequest, NodeProtocolInfo, RoutingInfo,
    SendDataMulticastRequest, SendDataRequest, SerialApiInitData, TransmitReport,
    TransmitResponse, TransmitStatus, UpdateKind,
};
use crate::priority::MessagePriority;
use crate::registry::{classify, MessageOrigin};

/// Everything decoding needs besides the bytes.
#[derive(Clone, Copy)]
pub struct MessageContext<'a> {
    pub origin: MessageOrigin,
    pub cc: &'a dyn CcContext,
}

impl<'a> MessageContext<'a> {
    /// Decoding frames read from the controller.
    pub fn controller(cc: &'a dyn CcContext) -> Self {
        Self {
            origin: MessageOrigin::Controller,
            cc,
        }
    }

    /// Decoding frames this host wrote.
    pub fn host(cc: &'a dyn CcContext) -> Self {
        Self {
            origin: MessageOrigin::Host,
            cc,
        }
    }
}

/// One serial API message with its typed fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "message", content = "fields", rename_all = "snake_case")]
pub enum Message {
    SendData(SendDataRequest),
    SendDataResponse(TransmitResponse),
    SendDataCallback(TransmitReport),
    SendDataMulticast(SendDataMulticastRequest),
    SendDataMulticastResponse(TransmitResponse),
    SendDataMulticastCallback(TransmitReport),
    SendDataAbort,
    ApplicationCommand(ApplicationCommandRequest),
    ApplicationUpdate(ApplicationUpdateRequest),
    GetControllerVersion,
    GetControllerVersionResponse(ControllerVersion),
    GetSerialApiInitData,
    GetSerialApiInitDataResponse(SerialApiInitData),
    GetControllerId,
    GetControllerIdResponse(ControllerId),
    GetNodeProtocolInfo { node_id: NodeId },
    GetNodeProtocolInfoResponse(NodeProtocolInfo),
    RequestNodeInfo { node_id: NodeId },
    RequestNodeInfoResponse(TransmitResponse),
    GetRoutingInfo(GetRoutingInfoRequest),
    GetRoutingInfoResponse(RoutingInfo),
    AssignReturnRoute(AssignReturnRouteRequest),
    AssignReturnRouteResponse(TransmitResponse),
    AssignReturnRouteCallback(TransmitReport),
    IsFailedNode { node_id: NodeId },
    IsFailedNodeResponse { failed: bool },
    SoftReset,
}

impl Message {
    /// Decode a data frame. The concrete variant is chosen from the header
    /// and origin before any field is read.
    pub fn from_frame(frame: &DataFrame, ctx: &MessageContext<'_>) -> Result<Self> {
        let kind = classify(frame.message_type, frame.function_id, ctx.origin).ok_or(
            MessageError::NotImplemented {
                message_type: frame.message_type,
                function_id: frame.function_id,
            },
        )?;
        trace!(%kind, len = frame.payload.len(), "decoding message");
        Self::decode(kind, &frame.payload, ctx.cc)
    }

    /// Decode one frame from the front of `bytes`, returning the bytes used.
    pub fn parse(bytes: &[u8], ctx: &MessageContext<'_>) -> Result<(Self, usize)> {
        let (frame, consumed) = decode_frame(bytes)?;
        match frame {
            Frame::Data(data) => Ok((Self::from_frame(&data, ctx)?, consumed)),
            other => Err(FrameError::Invalid(format!("{other} carries no message")).into()),
        }
    }

    /// Decode the payload of an already classified message.
    pub fn decode(kind: MessageKind, payload: &[u8], cc: &dyn CcContext) -> Result<Self> {
        use MessageKind as K;
        Ok(match kind {
            K::SendData => Self::SendData(SendDataRequest::parse(payload, cc)?),
            K::SendDataResponse => Self::SendDataResponse(TransmitResponse::parse(payload)?),
            K::SendDataCallback => Self::SendDataCallback(TransmitReport::parse(payload)?),
            K::SendDataMulticast => {
                Self::SendDataMulticast(SendDataMulticastRequest::parse(payload, cc)?)
            }
            K::SendDataMulticastResponse => {
                Self::SendDataMulticastResponse(TransmitResponse::parse(payload)?)
            }
            K::SendDataMulticastCallback => {
                Self::SendDataMulticastCallback(TransmitReport::parse(payload)?)
            }
            K::SendDataAbort => Self::SendDataAbort,
            K::ApplicationCommand => {
                Self::ApplicationCommand(ApplicationCommandRequest::parse(payload, cc)?)
            }
            K::ApplicationUpdate => {
                Self::ApplicationUpdate(ApplicationUpdateRequest::parse(payload)?)
            }
            K::GetControllerVersion => Self::GetControllerVersion,
            K::GetControllerVersionResponse => {
                Self::GetControllerVersionResponse(ControllerVersion::parse(payload)?)
            }
            K::GetSerialApiInitData => Self::GetSerialApiInitData,
            K::GetSerialApiInitDataResponse => {
                Self::GetSerialApiInitDataResponse(SerialApiInitData::parse(payload)?)
            }
            K::GetControllerId => Self::GetControllerId,
            K::GetControllerIdResponse => {
                Self::GetControllerIdResponse(ControllerId::parse(payload)?)
            }
            K::GetNodeProtocolInfo => Self::GetNodeProtocolInfo {
                node_id: parse_node_id(payload)?,
            },
            K::GetNodeProtocolInfoResponse => {
                Self::GetNodeProtocolInfoResponse(NodeProtocolInfo::parse(payload)?)
            }
            K::RequestNodeInfo => Self::RequestNodeInfo {
                node_id: parse_node_id(payload)?,
            },
            K::RequestNodeInfoResponse => {
                Self::RequestNodeInfoResponse(TransmitResponse::parse(payload)?)
            }
            K::GetRoutingInfo => Self::GetRoutingInfo(GetRoutingInfoRequest::parse(payload)?),
            K::GetRoutingInfoResponse => Self::GetRoutingInfoResponse(RoutingInfo::parse(payload)?),
            K::AssignReturnRoute => {
                Self::AssignReturnRoute(AssignReturnRouteRequest::parse(payload)?)
            }
            K::AssignReturnRouteResponse => {
                Self::AssignReturnRouteResponse(TransmitResponse::parse(payload)?)
            }
            K::AssignReturnRouteCallback => {
                Self::AssignReturnRouteCallback(TransmitReport::parse(payload)?)
            }
            K::IsFailedNode => Self::IsFailedNode {
                node_id: parse_node_id(payload)?,
            },
            K::IsFailedNodeResponse => Self::IsFailedNodeResponse {
                failed: parse_flag(payload)?,
            },
            K::SoftReset => Self::SoftReset,
        })
    }

    /// Encode the payload behind message type and function id.
    pub fn encode_payload(&self, cc: &dyn CcContext) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        match self {
            Self::SendData(request) => request.encode(cc, &mut out)?,
            Self::SendDataMulticast(request) => request.encode(cc, &mut out)?,
            Self::SendDataResponse(response)
            | Self::SendDataMulticastResponse(response)
            | Self::RequestNodeInfoResponse(response)
            | Self::AssignReturnRouteResponse(response) => response.encode(&mut out),
            Self::SendDataCallback(report)
            | Self::SendDataMulticastCallback(report)
            | Self::AssignReturnRouteCallback(report) => report.encode(&mut out),
            Self::ApplicationCommand(request) => request.encode(cc, &mut out)?,
            Self::ApplicationUpdate(update) => update.encode(&mut out)?,
            Self::GetControllerVersionResponse(version) => version.encode(&mut out),
            Self::GetSerialApiInitDataResponse(data) => data.encode(&mut out),
            Self::GetControllerIdResponse(id) => id.encode(&mut out),
            Self::GetNodeProtocolInfo { node_id }
            | Self::RequestNodeInfo { node_id }
            | Self::IsFailedNode { node_id } => out.push(*node_id),
            Self::GetNodeProtocolInfoResponse(info) => info.encode(&mut out),
            Self::GetRoutingInfo(request) => request.encode(&mut out),
            Self::GetRoutingInfoResponse(info) => info.encode(&mut out),
            Self::AssignReturnRoute(request) => request.encode(&mut out)?,
            Self::IsFailedNodeResponse { failed } => out.push(u8::from(*failed)),
            Self::SendDataAbort
            | Self::GetControllerVersion
            | Self::GetSerialApiInitData
            | Self::GetControllerId
            | Self::SoftReset => {}
        }
        Ok(out)
    }

    pub fn to_frame(&self, cc: &dyn CcContext) -> Result<Frame> {
        Ok(Frame::data(
            self.message_type(),
            self.function_id().as_u8(),
            self.encode_payload(cc)?,
        ))
    }

    /// Full wire bytes including SOF, length and checksum.
    pub fn serialize(&self, cc: &dyn CcContext) -> Result<Vec<u8>> {
        let mut out = BytesMut::new();
        encode_frame(&self.to_frame(cc)?, &mut out)?;
        Ok(out.to_vec())
    }

    pub fn kind(&self) -> MessageKind {
        use MessageKind as K;
        match self {
            Self::SendData(_) => K::SendData,
            Self::SendDataResponse(_) => K::SendDataResponse,
            Self::SendDataCallback(_) => K::SendDataCallback,
            Self::SendDataMulticast(_) => K::SendDataMulticast,
            Self::SendDataMulticastResponse(_) => K::SendDataMulticastResponse,
            Self::SendDataMulticastCallback(_) => K::SendDataMulticastCallback,
            Self::SendDataAbort => K::SendDataAbort,
            Self::ApplicationCommand(_) => K::ApplicationCommand,
            Self::ApplicationUpdate(_) => K::ApplicationUpdate,
            Self::GetControllerVersion => K::GetControllerVersion,
            Self::GetControllerVersionResponse(_) => K::GetControllerVersionResponse,
            Self::GetSerialApiInitData => K::GetSerialApiInitData,
            Self::GetSerialApiInitDataResponse(_) => K::GetSerialApiInitDataResponse,
            Self::GetControllerId => K::GetControllerId,
            Self::GetControllerIdResponse(_) => K::GetControllerIdResponse,
            Self::GetNodeProtocolInfo { .. } => K::GetNodeProtocolInfo,
            Self::GetNodeProtocolInfoResponse(_) => K::GetNodeProtocolInfoResponse,
            Self::RequestNodeInfo { .. } => K::RequestNodeInfo,
            Self::RequestNodeInfoResponse(_) => K::RequestNodeInfoResponse,
            Self::GetRoutingInfo(_) => K::GetRoutingInfo,
            Self::GetRoutingInfoResponse(_) => K::GetRoutingInfoResponse,
            Self::AssignReturnRoute(_) => K::AssignReturnRoute,
            Self::AssignReturnRouteResponse(_) => K::AssignReturnRouteResponse,
            Self::AssignReturnRouteCallback(_) => K::AssignReturnRouteCallback,
            Self::IsFailedNode { .. } => K::IsFailedNode,
            Self::IsFailedNodeResponse { .. } => K::IsFailedNodeResponse,
            Self::SoftReset => K::SoftReset,
        }
    }

    pub fn function_id(&self) -> FunctionId {
        self.kind().function_id()
    }

    pub fn category(&self) -> MessageCategory {
        self.kind().category()
    }

    pub fn message_type(&self) -> MessageType {
        self.kind().message_type()
    }

    /// The node this message is addressed to or came from.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::SendData(request) => request.command.node_id(),
            Self::ApplicationCommand(request) => request.source(),
            Self::ApplicationUpdate(update) => Some(update.node_id),
            Self::GetNodeProtocolInfo { node_id }
            | Self::RequestNodeInfo { node_id }
            | Self::IsFailedNode { node_id } => Some(*node_id),
            Self::GetRoutingInfo(request) => Some(request.node_id),
            Self::AssignReturnRoute(request) => Some(request.node_id),
            _ => None,
        }
    }

    pub fn command_class(&self) -> Option<&CommandClass> {
        match self {
            Self::SendData(request) => Some(&request.command),
            Self::SendDataMulticast(request) => Some(&request.command),
            Self::ApplicationCommand(request) => Some(&request.command),
            _ => None,
        }
    }

    pub fn command_class_mut(&mut self) -> Option<&mut CommandClass> {
        match self {
            Self::SendData(request) => Some(&mut request.command),
            Self::SendDataMulticast(request) => Some(&mut request.command),
            Self::ApplicationCommand(request) => Some(&mut request.command),
            _ => None,
        }
    }

    /// Whether serializing requires a callback id to be assigned first.
    pub fn needs_callback_id(&self) -> bool {
        matches!(
            self,
            Self::SendData(_) | Self::SendDataMulticast(_) | Self::AssignReturnRoute(_)
        )
    }

    pub fn callback_id(&self) -> Option<u8> {
        match self {
            Self::SendData(request) => request.callback_id,
            Self::SendDataMulticast(request) => request.callback_id,
            Self::AssignReturnRoute(request) => request.callback_id,
            Self::SendDataCallback(report)
            | Self::SendDataMulticastCallback(report)
            | Self::AssignReturnRouteCallback(report) => Some(report.callback_id),
            _ => None,
        }
    }

    /// No-op for messages without a callback id.
    pub fn set_callback_id(&mut self, callback_id: u8) {
        match self {
            Self::SendData(request) => request.callback_id = Some(callback_id),
            Self::SendDataMulticast(request) => request.callback_id = Some(callback_id),
            Self::AssignReturnRoute(request) => request.callback_id = Some(callback_id),
            _ => {}
        }
    }

    /// Forget the callback id so the next attempt gets a fresh one.
    pub fn prepare_retransmission(&mut self) {
        match self {
            Self::SendData(request) => request.callback_id = None,
            Self::SendDataMulticast(request) => request.callback_id = None,
            Self::AssignReturnRoute(request) => request.callback_id = None,
            _ => {}
        }
    }

    pub fn max_send_attempts(&self) -> u8 {
        match self {
            Self::SendData(request) => request.max_send_attempts(),
            _ => 1,
        }
    }

    /// Explicit positive or negative outcome of a response or callback.
    /// Messages that carry no outcome count as positive.
    pub fn is_ok(&self) -> bool {
        match self {
            Self::SendDataResponse(response)
            | Self::SendDataMulticastResponse(response)
            | Self::RequestNodeInfoResponse(response)
            | Self::AssignReturnRouteResponse(response) => response.was_sent,
            Self::SendDataCallback(report)
            | Self::SendDataMulticastCallback(report)
            | Self::AssignReturnRouteCallback(report) => report.status.is_ok(),
            Self::ApplicationUpdate(update) => update.kind != UpdateKind::NodeInfoRequestFailed,
            _ => true,
        }
    }

    /// Status of a transmit callback.
    pub fn transmit_status(&self) -> Option<TransmitStatus> {
        match self {
            Self::SendDataCallback(report)
            | Self::SendDataMulticastCallback(report)
            | Self::AssignReturnRouteCallback(report) => Some(report.status),
            _ => None,
        }
    }

    pub fn expected_response(&self) -> Option<Expectation> {
        use MessageKind as K;
        let kind = match self {
            Self::SendData(_) => K::SendDataResponse,
            Self::SendDataMulticast(_) => K::SendDataMulticastResponse,
            Self::GetControllerVersion => K::GetControllerVersionResponse,
            Self::GetSerialApiInitData => K::GetSerialApiInitDataResponse,
            Self::GetControllerId => K::GetControllerIdResponse,
            Self::GetNodeProtocolInfo { .. } => K::GetNodeProtocolInfoResponse,
            Self::RequestNodeInfo { .. } => K::RequestNodeInfoResponse,
            Self::GetRoutingInfo(_) => K::GetRoutingInfoResponse,
            Self::AssignReturnRoute(_) => K::AssignReturnRouteResponse,
            Self::IsFailedNode { .. } => K::IsFailedNodeResponse,
            _ => return None,
        };
        Some(Expectation::Kind(kind))
    }

    /// `None` means fire-and-forget once the response (if any) arrives.
    pub fn expected_callback(&self) -> Option<Expectation> {
        match self {
            // callback id 0 asks the controller not to call back
            Self::SendData(_) | Self::SendDataMulticast(_) | Self::AssignReturnRoute(_)
                if self.callback_id() == Some(0) =>
            {
                None
            }
            Self::SendData(_) => Some(Expectation::Kind(MessageKind::SendDataCallback)),
            Self::SendDataMulticast(_) => {
                Some(Expectation::Kind(MessageKind::SendDataMulticastCallback))
            }
            Self::AssignReturnRoute(_) => {
                Some(Expectation::Kind(MessageKind::AssignReturnRouteCallback))
            }
            Self::RequestNodeInfo { .. } => Some(Expectation::Predicate(node_info_answers)),
            _ => None,
        }
    }

    /// Whether the exchange ends with a CC sent back by the target node.
    pub fn expects_node_update(&self) -> bool {
        match self {
            Self::SendData(request) => request.command.expected_report().is_some(),
            _ => false,
        }
    }

    pub fn is_expected_node_update(&self, candidate: &Message) -> bool {
        match (self, candidate) {
            (Self::SendData(request), Self::ApplicationCommand(received)) => {
                request.command.is_expected_report(&received.command)
            }
            _ => false,
        }
    }

    /// Queue priority when the caller does not choose one.
    pub fn default_priority(&self) -> MessagePriority {
        match self {
            Self::SendData(request) => match &request.command.innermost().command {
                Command::Security(SecurityCommand::NonceReport { .. }) => MessagePriority::Nonce,
                Command::Supervision(SupervisionCommand::Report { .. }) => {
                    MessagePriority::Supervision
                }
                _ => MessagePriority::Normal,
            },
            Self::RequestNodeInfo { .. } => MessagePriority::NodeQuery,
            Self::SendDataAbort
            | Self::GetControllerVersion
            | Self::GetSerialApiInitData
            | Self::GetControllerId
            | Self::GetNodeProtocolInfo { .. }
            | Self::GetRoutingInfo(_)
            | Self::AssignReturnRoute(_)
            | Self::IsFailedNode { .. }
            | Self::SoftReset => MessagePriority::Controller,
            _ => MessagePriority::Normal,
        }
    }
}

fn node_info_answers(sent: &Message, candidate: &Message) -> bool {
    let Message::ApplicationUpdate(update) = candidate else {
        return false;
    };
    match update.kind {
        UpdateKind::NodeInfoReceived => Some(update.node_id) == sent.node_id(),
        UpdateKind::NodeInfoRequestFailed => true,
        _ => false,
    }
}

impl From<SendDataRequest> for Message {
    fn from(request: SendDataRequest) -> Self {
        Self::SendData(request)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())?;
        if let Some(callback_id) = self.callback_id() {
            write!(f, " cb {callback_id}")?;
        }
        match self.command_class() {
            Some(cc) => write!(f, " [{cc}]"),
            None => match self.node_id() {
                Some(node) => write!(f, " node {node}"),
                None => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zwave_cc::cc::basic::BasicCommand;
    use zwave_cc::cc::manufacturer_specific::ManufacturerSpecificCommand;
    use zwave_cc::cc::supervision::SupervisionStatus;
    use zwave_cc::{CcError, StaticContext, TransmitOptions};
    use zwave_frame::ErrorCode;

    fn cc_ctx() -> StaticContext {
        StaticContext::new(1)
    }

    fn from_controller(bytes: &[u8]) -> (Message, usize) {
        let ctx = cc_ctx();
        Message::parse(bytes, &MessageContext::controller(&ctx)).unwrap()
    }

    #[test]
    fn raw_send_data_fixture_roundtrips() {
        let bytes = [
            0x01, 0x0c, 0x00, 0x13, 0x02, 0x05, 0x5d, 0x02, 0x01, 0x02, 0x03, 0x25, 0xfe, 0x63,
        ];
        let ctx = cc_ctx();
        let (message, consumed) = Message::parse(&bytes, &MessageContext::host(&ctx)).unwrap();
        assert_eq!(consumed, bytes.len());
        let Message::SendData(request) = &message else {
            panic!("unexpected {message:?}");
        };
        assert_eq!(request.command.node_id(), Some(2));
        assert_eq!(request.tx_options, TransmitOptions::DEFAULT);
        assert_eq!(request.callback_id, Some(0xfe));
        let Command::Raw(raw) = &request.command.command else {
            panic!("unexpected {:?}", request.command.command);
        };
        assert_eq!((raw.cc_id, raw.command), (0x5d, 0x02));
        assert_eq!(raw.payload, vec![0x01, 0x02, 0x03]);

        assert_eq!(message.serialize(&ctx).unwrap(), bytes);
    }

    #[test]
    fn two_messages_in_one_buffer() {
        let bytes = [
            0x01, 0x07, 0x00, 0x13, 0x0f, 0x00, 0x00, 0x02, 0xe6, 0x01, 0x0e, 0x00, 0x04, 0x00,
            0x02, 0x08, 0x72, 0x05, 0x00, 0x86, 0x00, 0x02, 0x00, 0x82, 0x8e,
        ];
        let (first, used) = from_controller(&bytes);
        assert_eq!(used, 9);
        assert_eq!(
            first,
            Message::SendDataCallback(TransmitReport {
                callback_id: 0x0f,
                status: TransmitStatus::Ok,
                report: vec![0x00, 0x02],
            })
        );

        let (second, rest) = from_controller(&bytes[used..]);
        assert_eq!(rest, bytes.len() - used);
        assert_eq!(second.node_id(), Some(2));
        assert_eq!(
            second.command_class().unwrap().command,
            Command::ManufacturerSpecific(ManufacturerSpecificCommand::Report {
                manufacturer_id: 0x0086,
                product_type: 0x0002,
                product_id: 0x0082,
            })
        );

        let ctx = cc_ctx();
        assert_eq!(first.serialize(&ctx).unwrap(), &bytes[..used]);
        assert_eq!(second.serialize(&ctx).unwrap(), &bytes[used..]);
    }

    #[test]
    fn unknown_function_is_not_implemented() {
        let ctx = cc_ctx();
        let frame = DataFrame {
            message_type: MessageType::Request,
            function_id: 0xEE,
            payload: Default::default(),
        };
        let err = Message::from_frame(&frame, &MessageContext::controller(&ctx)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::DeserializationNotImplemented);
    }

    #[test]
    fn control_bytes_are_not_messages() {
        let ctx = cc_ctx();
        let err = Message::parse(&[0x06], &MessageContext::controller(&ctx)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::PacketFormatInvalid);
    }

    #[test]
    fn serialize_requires_callback_id() {
        let mut message: Message =
            SendDataRequest::new(CommandClass::new(2u8, BasicCommand::Get)).into();
        let err = message.serialize(&cc_ctx()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ArgumentInvalid);

        message.set_callback_id(9);
        assert!(message.serialize(&cc_ctx()).is_ok());
        message.prepare_retransmission();
        assert_eq!(message.callback_id(), None);
    }

    #[test]
    fn callback_matching_uses_callback_id() {
        let mut sent: Message =
            SendDataRequest::new(CommandClass::new(2u8, BasicCommand::Get)).into();
        sent.set_callback_id(4);
        let expectation = sent.expected_callback().unwrap();

        let matching = Message::SendDataCallback(TransmitReport::new(4, TransmitStatus::Ok));
        let other = Message::SendDataCallback(TransmitReport::new(5, TransmitStatus::Ok));
        assert!(expectation.matches(&sent, &matching));
        assert!(!expectation.matches(&sent, &other));

        let response = Message::SendDataResponse(TransmitResponse { was_sent: true });
        assert!(sent.expected_response().unwrap().matches(&sent, &response));
        assert!(!expectation.matches(&sent, &response));
    }

    #[test]
    fn callback_id_zero_is_fire_and_forget() {
        let mut sent: Message =
            SendDataRequest::new(CommandClass::new(2u8, BasicCommand::Set { target_value: 1 }))
                .into();
        sent.set_callback_id(0);
        assert!(sent.expected_callback().is_none());
        assert!(sent.expected_response().is_some());
    }

    #[test]
    fn node_info_predicate() {
        let sent = Message::RequestNodeInfo { node_id: 5 };
        let expectation = sent.expected_callback().unwrap();
        let update = |kind, node_id| {
            Message::ApplicationUpdate(ApplicationUpdateRequest {
                kind,
                node_id,
                node_info: None,
            })
        };
        assert!(expectation.matches(&sent, &update(UpdateKind::NodeInfoReceived, 5)));
        assert!(!expectation.matches(&sent, &update(UpdateKind::NodeInfoReceived, 6)));

        let failed = update(UpdateKind::NodeInfoRequestFailed, 0);
        assert!(expectation.matches(&sent, &failed));
        assert!(!failed.is_ok());
    }

    #[test]
    fn node_update_matching() {
        let sent: Message = SendDataRequest::new(CommandClass::new(2u8, BasicCommand::Get)).into();
        assert!(sent.expects_node_update());

        let report = |node: u8| {
            Message::ApplicationCommand(ApplicationCommandRequest::new(CommandClass::new(
                node,
                BasicCommand::Report {
                    current_value: 0,
                    target_value: None,
                    duration: None,
                },
            )))
        };
        assert!(sent.is_expected_node_update(&report(2)));
        assert!(!sent.is_expected_node_update(&report(3)));
    }

    #[test]
    fn priorities() {
        let status = SupervisionCommand::Report {
            more_updates_follow: false,
            session_id: 1,
            status: SupervisionStatus::Success,
            duration: None,
        };
        let message: Message = SendDataRequest::new(CommandClass::new(2u8, status)).into();
        assert_eq!(message.default_priority(), MessagePriority::Supervision);
        assert_eq!(
            Message::GetControllerVersion.default_priority(),
            MessagePriority::Controller
        );
        assert_eq!(
            Message::RequestNodeInfo { node_id: 2 }.default_priority(),
            MessagePriority::NodeQuery
        );
    }

    #[test]
    fn cc_errors_keep_their_code() {
        let ctx = cc_ctx();
        let err = Message::decode(
            MessageKind::ApplicationCommand,
            &[0x00, 0x02, 0x03, 0x20, 0x01, 0x70],
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, MessageError::Cc(CcError::InvalidPayload(_))));
        assert!(err.is_recoverable());
    }
}
