//! Unsolicited traffic from the controller: received CCs and node updates.

use serde::Serialize;
use zwave_cc::{CcContext, CommandClass, NodeId, PayloadReader};

use crate::error::{MessageError, Result};

/// Frame was received via a route with a busy repeater.
pub const RX_ROUTED_BUSY: u8 = 0x01;
pub const RX_LOW_POWER: u8 = 0x02;
const RX_TYPE_MASK: u8 = 0x0C;
const RX_TYPE_BROADCAST: u8 = 0x04;
const RX_TYPE_MULTICAST: u8 = 0x08;

/// A CC received from a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationCommandRequest {
    pub rx_status: u8,
    pub command: CommandClass,
    /// Signal strength in dBm, when the controller reports it.
    pub rssi: Option<i8>,
}

impl ApplicationCommandRequest {
    pub fn new(command: CommandClass) -> Self {
        Self {
            rx_status: 0,
            command,
            rssi: None,
        }
    }

    pub fn source(&self) -> Option<NodeId> {
        self.command.node_id()
    }

    pub fn is_broadcast(&self) -> bool {
        self.rx_status & RX_TYPE_MASK == RX_TYPE_BROADCAST
    }

    pub fn is_multicast(&self) -> bool {
        self.rx_status & RX_TYPE_MASK == RX_TYPE_MULTICAST
    }

    pub(crate) fn parse(payload: &[u8], ctx: &dyn CcContext) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let rx_status = reader.u8()?;
        let source = reader.u8()?;
        let len = reader.u8()? as usize;
        if len == 0 {
            return Err(MessageError::InvalidPayload("empty application command".into()));
        }
        let command = CommandClass::parse(reader.bytes(len)?, source, ctx)?;
        Ok(Self {
            rx_status,
            command,
            rssi: reader.optional_u8().map(|b| b as i8),
        })
    }

    pub(crate) fn encode(&self, ctx: &dyn CcContext, out: &mut Vec<u8>) -> Result<()> {
        let source = self
            .source()
            .ok_or_else(|| MessageError::Argument("application command needs a source node".into()))?;
        let cc = self.command.serialize(ctx)?;
        let len = u8::try_from(cc.len())
            .map_err(|_| MessageError::Argument(format!("{} byte command", cc.len())))?;
        out.push(self.rx_status);
        out.push(source);
        out.push(len);
        out.extend(cc);
        if let Some(rssi) = self.rssi {
            out.push(rssi as u8);
        }
        Ok(())
    }
}

/// What an application update announces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    NodeInfoReceived,
    NodeInfoRequestDone,
    NodeInfoRequestFailed,
    RoutingPending,
    NewIdAssigned,
    DeleteDone,
    SucId,
    Other(u8),
}

impl UpdateKind {
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0x84 => Self::NodeInfoReceived,
            0x82 => Self::NodeInfoRequestDone,
            0x81 => Self::NodeInfoRequestFailed,
            0x80 => Self::RoutingPending,
            0x40 => Self::NewIdAssigned,
            0x20 => Self::DeleteDone,
            0x10 => Self::SucId,
            other => Self::Other(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::NodeInfoReceived => 0x84,
            Self::NodeInfoRequestDone => 0x82,
            Self::NodeInfoRequestFailed => 0x81,
            Self::RoutingPending => 0x80,
            Self::NewIdAssigned => 0x40,
            Self::DeleteDone => 0x20,
            Self::SucId => 0x10,
            Self::Other(byte) => byte,
        }
    }
}

/// Device classes and supported CCs from a node information frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeInfo {
    pub basic_class: u8,
    pub generic_class: u8,
    pub specific_class: u8,
    pub supported_ccs: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationUpdateRequest {
    pub kind: UpdateKind,
    pub node_id: NodeId,
    pub node_info: Option<NodeInfo>,
}

impl ApplicationUpdateRequest {
    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let kind = UpdateKind::from_u8(reader.u8()?);
        let node_id = reader.u8()?;
        let len = reader.optional_u8().unwrap_or(0) as usize;
        let node_info = match len {
            0 => None,
            1 | 2 => {
                return Err(MessageError::InvalidPayload(format!(
                    "node information of {len} bytes"
                )))
            }
            _ => {
                let body = reader.bytes(len)?;
                Some(NodeInfo {
                    basic_class: body[0],
                    generic_class: body[1],
                    specific_class: body[2],
                    supported_ccs: body[3..].to_vec(),
                })
            }
        };
        Ok(Self {
            kind,
            node_id,
            node_info,
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        out.push(self.kind.as_u8());
        out.push(self.node_id);
        match &self.node_info {
            None => out.push(0),
            Some(info) => {
                let len = u8::try_from(3 + info.supported_ccs.len()).map_err(|_| {
                    MessageError::Argument(format!(
                        "{} supported CCs in one update",
                        info.supported_ccs.len()
                    ))
                })?;
                out.push(len);
                out.push(info.basic_class);
                out.push(info.generic_class);
                out.push(info.specific_class);
                out.extend_from_slice(&info.supported_ccs);
            }
        }
        Ok(())
    }
}
