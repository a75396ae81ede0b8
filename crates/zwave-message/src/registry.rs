//! Static (message type, function id) table.
//!
//! Lookup is two-phase: [`classify`] picks the final [`MessageKind`] from
//! the frame header and the stream origin alone, then the message layer
//! decodes fields straight into that variant.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::Serialize;
use zwave_frame::MessageType;

use crate::function::FunctionId;
use crate::kind::MessageKind;

/// Who put the bytes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageOrigin {
    /// This process. Used when decoding our own frames, e.g. in logs.
    Host,
    /// The controller chip. Everything read from the serial port.
    #[default]
    Controller,
}

#[derive(Debug, Clone, Copy)]
enum Classifier {
    Fixed(MessageKind),
    ByOrigin {
        host: MessageKind,
        controller: MessageKind,
    },
}

impl Classifier {
    fn resolve(self, origin: MessageOrigin) -> MessageKind {
        match (self, origin) {
            (Self::Fixed(kind), _) => kind,
            (Self::ByOrigin { host, .. }, MessageOrigin::Host) => host,
            (Self::ByOrigin { controller, .. }, MessageOrigin::Controller) => controller,
        }
    }
}

static REGISTRY: LazyLock<HashMap<(MessageType, u8), Classifier>> = LazyLock::new(|| {
    use Classifier::{ByOrigin, Fixed};
    use FunctionId as F;
    use MessageKind as K;
    use MessageType::{Request, Response};

    HashMap::from([
        (
            (Request, F::SendData as u8),
            ByOrigin {
                host: K::SendData,
                controller: K::SendDataCallback,
            },
        ),
        ((Response, F::SendData as u8), Fixed(K::SendDataResponse)),
        (
            (Request, F::SendDataMulticast as u8),
            ByOrigin {
                host: K::SendDataMulticast,
                controller: K::SendDataMulticastCallback,
            },
        ),
        (
            (Response, F::SendDataMulticast as u8),
            Fixed(K::SendDataMulticastResponse),
        ),
        ((Request, F::SendDataAbort as u8), Fixed(K::SendDataAbort)),
        (
            (Request, F::ApplicationCommand as u8),
            Fixed(K::ApplicationCommand),
        ),
        (
            (Request, F::ApplicationUpdate as u8),
            Fixed(K::ApplicationUpdate),
        ),
        (
            (Request, F::GetControllerVersion as u8),
            Fixed(K::GetControllerVersion),
        ),
        (
            (Response, F::GetControllerVersion as u8),
            Fixed(K::GetControllerVersionResponse),
        ),
        (
            (Request, F::GetSerialApiInitData as u8),
            Fixed(K::GetSerialApiInitData),
        ),
        (
            (Response, F::GetSerialApiInitData as u8),
            Fixed(K::GetSerialApiInitDataResponse),
        ),
        ((Request, F::GetControllerId as u8), Fixed(K::GetControllerId)),
        (
            (Response, F::GetControllerId as u8),
            Fixed(K::GetControllerIdResponse),
        ),
        (
            (Request, F::GetNodeProtocolInfo as u8),
            Fixed(K::GetNodeProtocolInfo),
        ),
        (
            (Response, F::GetNodeProtocolInfo as u8),
            Fixed(K::GetNodeProtocolInfoResponse),
        ),
        ((Request, F::RequestNodeInfo as u8), Fixed(K::RequestNodeInfo)),
        (
            (Response, F::RequestNodeInfo as u8),
            Fixed(K::RequestNodeInfoResponse),
        ),
        ((Request, F::GetRoutingInfo as u8), Fixed(K::GetRoutingInfo)),
        (
            (Response, F::GetRoutingInfo as u8),
            Fixed(K::GetRoutingInfoResponse),
        ),
        (
            (Request, F::AssignReturnRoute as u8),
            ByOrigin {
                host: K::AssignReturnRoute,
                controller: K::AssignReturnRouteCallback,
            },
        ),
        (
            (Response, F::AssignReturnRoute as u8),
            Fixed(K::AssignReturnRouteResponse),
        ),
        ((Request, F::IsFailedNode as u8), Fixed(K::IsFailedNode)),
        (
            (Response, F::IsFailedNode as u8),
            Fixed(K::IsFailedNodeResponse),
        ),
        ((Request, F::SoftReset as u8), Fixed(K::SoftReset)),
    ])
});

/// Pick the concrete variant for a frame header. `None` when nothing is
/// registered for this message type and function id.
pub fn classify(
    message_type: MessageType,
    function_id: u8,
    origin: MessageOrigin,
) -> Option<MessageKind> {
    REGISTRY
        .get(&(message_type, function_id))
        .map(|classifier| classifier.resolve(origin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_is_reachable_and_redirects_idempotently() {
        for kind in MessageKind::ALL {
            let classified = classify(kind.message_type(), kind.function_id().as_u8(), kind.origin());
            assert_eq!(classified, Some(kind), "{kind:?}");
            let again = classify(
                classified.unwrap().message_type(),
                classified.unwrap().function_id().as_u8(),
                classified.unwrap().origin(),
            );
            assert_eq!(again, classified);
        }
    }

    #[test]
    fn send_data_request_depends_on_origin() {
        assert_eq!(
            classify(MessageType::Request, 0x13, MessageOrigin::Host),
            Some(MessageKind::SendData)
        );
        assert_eq!(
            classify(MessageType::Request, 0x13, MessageOrigin::Controller),
            Some(MessageKind::SendDataCallback)
        );
        assert_eq!(
            classify(MessageType::Response, 0x13, MessageOrigin::Host),
            Some(MessageKind::SendDataResponse)
        );
    }

    #[test]
    fn unknown_function_is_unregistered() {
        assert_eq!(classify(MessageType::Request, 0xEE, MessageOrigin::Controller), None);
        assert_eq!(classify(MessageType::Response, 0x04, MessageOrigin::Controller), None);
    }
}
