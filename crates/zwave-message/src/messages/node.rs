//! Per-node controller functions: protocol info, routing, failure checks.

use serde::Serialize;
use zwave_cc::{NodeId, PayloadReader};

use crate::error::{MessageError, Result};
use crate::messages::controller::{encode_node_bitmask, parse_node_bitmask, NODE_BITMASK_LEN};

const CAP_LISTENING: u8 = 0x80;
const CAP_ROUTING: u8 = 0x40;
const CAP_PROTOCOL_VERSION: u8 = 0x07;
const SEC_FREQUENT_LISTENING: u8 = 0x60;
const SEC_BEAMING: u8 = 0x10;

/// Protocol-level facts the controller keeps about a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeProtocolInfo {
    pub capability: u8,
    pub security: u8,
    pub reserved: u8,
    pub basic_class: u8,
    pub generic_class: u8,
    pub specific_class: u8,
}

impl NodeProtocolInfo {
    /// Always-on nodes can be reached without waiting for a wake-up.
    pub fn is_listening(&self) -> bool {
        self.capability & CAP_LISTENING != 0
    }

    /// FLiRS nodes wake on a beam and count as reachable.
    pub fn is_frequent_listening(&self) -> bool {
        self.security & SEC_FREQUENT_LISTENING != 0
    }

    pub fn is_routing(&self) -> bool {
        self.capability & CAP_ROUTING != 0
    }

    pub fn supports_beaming(&self) -> bool {
        self.security & SEC_BEAMING != 0
    }

    pub fn protocol_version(&self) -> u8 {
        (self.capability & CAP_PROTOCOL_VERSION) + 1
    }

    /// Whether commands for this node must wait for a Wake Up Notification.
    pub fn can_sleep(&self) -> bool {
        !self.is_listening() && !self.is_frequent_listening()
    }

    /// A zero generic class means the controller does not know the node.
    pub fn is_present(&self) -> bool {
        self.generic_class != 0
    }

    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let [capability, security, reserved, basic_class, generic_class, specific_class] =
            reader.array()?;
        Ok(Self {
            capability,
            security,
            reserved,
            basic_class,
            generic_class,
            specific_class,
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&[
            self.capability,
            self.security,
            self.reserved,
            self.basic_class,
            self.generic_class,
            self.specific_class,
        ]);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GetRoutingInfoRequest {
    pub node_id: NodeId,
    pub remove_bad_links: bool,
    pub remove_non_repeaters: bool,
}

impl GetRoutingInfoRequest {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            remove_bad_links: false,
            remove_non_repeaters: false,
        }
    }

    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        Ok(Self {
            node_id: reader.u8()?,
            remove_bad_links: reader.optional_u8().unwrap_or(0) != 0,
            remove_non_repeaters: reader.optional_u8().unwrap_or(0) != 0,
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.node_id);
        out.push(u8::from(self.remove_bad_links));
        out.push(u8::from(self.remove_non_repeaters));
        // function id for the controller's own callback, unused
        out.push(0x00);
    }
}

/// Neighbours the controller believes a node can hear directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingInfo {
    pub neighbours: Vec<NodeId>,
}

impl RoutingInfo {
    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        if payload.len() < NODE_BITMASK_LEN {
            return Err(MessageError::InvalidPayload(format!(
                "routing info of {} bytes",
                payload.len()
            )));
        }
        Ok(Self {
            neighbours: parse_node_bitmask(&payload[..NODE_BITMASK_LEN])?,
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend(encode_node_bitmask(&self.neighbours));
    }
}

/// Tell `node_id` how to reach `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AssignReturnRouteRequest {
    pub node_id: NodeId,
    pub destination: NodeId,
    pub callback_id: Option<u8>,
}

impl AssignReturnRouteRequest {
    pub fn new(node_id: NodeId, destination: NodeId) -> Self {
        Self {
            node_id,
            destination,
            callback_id: None,
        }
    }

    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        Ok(Self {
            node_id: reader.u8()?,
            destination: reader.u8()?,
            callback_id: reader.optional_u8(),
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        let callback_id = crate::messages::send_data::require_callback_id(self.callback_id)?;
        out.push(self.node_id);
        out.push(self.destination);
        out.push(callback_id);
        Ok(())
    }
}

pub(crate) fn parse_node_id(payload: &[u8]) -> Result<NodeId> {
    payload
        .first()
        .copied()
        .ok_or_else(|| MessageError::InvalidPayload("missing node id".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_info_flags() {
        let info = NodeProtocolInfo::parse(&[0xD3, 0x9C, 0x00, 0x04, 0x10, 0x01]).unwrap();
        assert!(info.is_listening());
        assert!(info.is_routing());
        assert!(info.supports_beaming());
        assert!(!info.can_sleep());
        assert_eq!(info.protocol_version(), 4);

        let sleeper = NodeProtocolInfo::parse(&[0x53, 0x80, 0x00, 0x04, 0x07, 0x01]).unwrap();
        assert!(sleeper.can_sleep());
        assert!(NodeProtocolInfo::parse(&[0x53, 0x80, 0x00]).is_err());
    }

    #[test]
    fn routing_info_neighbours() {
        let mut payload = vec![0b0000_0110];
        payload.extend([0u8; 28]);
        let info = RoutingInfo::parse(&payload).unwrap();
        assert_eq!(info.neighbours, vec![2, 3]);
        let mut out = Vec::new();
        info.encode(&mut out);
        assert_eq!(out, payload);
    }

    #[test]
    fn assign_return_route_needs_callback() {
        let mut request = AssignReturnRouteRequest::new(5, 1);
        assert!(request.encode(&mut Vec::new()).is_err());
        request.callback_id = Some(3);
        let mut out = Vec::new();
        request.encode(&mut out).unwrap();
        assert_eq!(out, vec![5, 1, 3]);
    }
}
