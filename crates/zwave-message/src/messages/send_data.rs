use serde::Serialize;
use zwave_cc::{
    compute_net_cc_payload_size, max_payload_for_tx_options, CcContext, CommandClass, Destination,
    NodeId, PayloadReader, TransmitOptions, UnknownCc,
};

use crate::error::{MessageError, Result};

/// SendData attempts when the caller does not say otherwise.
pub const DEFAULT_SEND_ATTEMPTS: u8 = 3;
/// Upper bound for SendData attempts.
pub const MAX_SEND_ATTEMPTS: u8 = 5;

/// Most nodes one multicast frame may address.
pub const MAX_MULTICAST_NODES: usize = 64;

/// Host request to transmit one CC to one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendDataRequest {
    pub command: CommandClass,
    pub tx_options: TransmitOptions,
    pub callback_id: Option<u8>,
    #[serde(skip)]
    max_send_attempts: u8,
}

impl SendDataRequest {
    pub fn new(command: CommandClass) -> Self {
        Self {
            command,
            tx_options: TransmitOptions::DEFAULT,
            callback_id: None,
            max_send_attempts: DEFAULT_SEND_ATTEMPTS,
        }
    }

    pub fn with_tx_options(mut self, tx_options: TransmitOptions) -> Self {
        self.tx_options = tx_options;
        self
    }

    /// Clamped to `1..=MAX_SEND_ATTEMPTS`.
    pub fn with_max_send_attempts(mut self, attempts: u8) -> Self {
        self.max_send_attempts = attempts.clamp(1, MAX_SEND_ATTEMPTS);
        self
    }

    pub fn max_send_attempts(&self) -> u8 {
        self.max_send_attempts
    }

    /// Largest serialized CC these transmit options allow.
    pub fn max_payload(&self) -> usize {
        max_payload_for_tx_options(self.tx_options)
    }

    /// Room left for the innermost CC payload.
    pub fn net_payload(&self) -> usize {
        compute_net_cc_payload_size(self.max_payload(), &self.command)
    }

    pub(crate) fn parse(payload: &[u8], ctx: &dyn CcContext) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let node_id = reader.u8()?;
        let len = reader.u8()? as usize;
        let cc = reader.bytes(len)?;
        // The host relays CCs it may not understand; keep them opaque.
        let command = CommandClass::parse_with(cc, node_id, ctx, UnknownCc::KeepRaw)?;
        let tx_options = TransmitOptions::from_bits(reader.u8()?);
        Ok(Self {
            command,
            tx_options,
            callback_id: reader.optional_u8(),
            max_send_attempts: DEFAULT_SEND_ATTEMPTS,
        })
    }

    pub(crate) fn encode(&self, ctx: &dyn CcContext, out: &mut Vec<u8>) -> Result<()> {
        let node_id = self.command.node_id().ok_or_else(|| {
            MessageError::Argument(format!(
                "SendData needs a singlecast target, got {}",
                self.command.node
            ))
        })?;
        let callback_id = require_callback_id(self.callback_id)?;
        let cc = self.command.serialize(ctx)?;
        check_cc_len(cc.len(), self.max_payload())?;
        out.push(node_id);
        out.push(cc.len() as u8);
        out.extend(cc);
        out.push(self.tx_options.bits());
        out.push(callback_id);
        Ok(())
    }
}

/// Host request to transmit one CC to several nodes at once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SendDataMulticastRequest {
    pub command: CommandClass,
    pub tx_options: TransmitOptions,
    pub callback_id: Option<u8>,
}

impl SendDataMulticastRequest {
    pub fn new(command: CommandClass) -> Self {
        Self {
            command,
            tx_options: TransmitOptions::ACK | TransmitOptions::AUTO_ROUTE,
            callback_id: None,
        }
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        match &self.command.node {
            Destination::Singlecast(node) => vec![*node],
            Destination::Multicast(nodes) => nodes.clone(),
            Destination::Broadcast => Vec::new(),
        }
    }

    pub(crate) fn parse(payload: &[u8], ctx: &dyn CcContext) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let count = reader.u8()? as usize;
        if count == 0 || count > MAX_MULTICAST_NODES {
            return Err(MessageError::InvalidPayload(format!(
                "multicast to {count} nodes"
            )));
        }
        let nodes = reader.bytes(count)?.to_vec();
        let len = reader.u8()? as usize;
        let cc = reader.bytes(len)?;
        let mut command = CommandClass::parse_with(cc, nodes[0], ctx, UnknownCc::KeepRaw)?;
        command.node = Destination::Multicast(nodes);
        Ok(Self {
            command,
            tx_options: TransmitOptions::from_bits(reader.u8()?),
            callback_id: reader.optional_u8(),
        })
    }

    pub(crate) fn encode(&self, ctx: &dyn CcContext, out: &mut Vec<u8>) -> Result<()> {
        let nodes = self.node_ids();
        if nodes.is_empty() || nodes.len() > MAX_MULTICAST_NODES {
            return Err(MessageError::Argument(format!(
                "multicast needs 1..={MAX_MULTICAST_NODES} nodes, got {}",
                nodes.len()
            )));
        }
        let callback_id = require_callback_id(self.callback_id)?;
        let cc = self.command.serialize(ctx)?;
        check_cc_len(cc.len(), max_payload_for_tx_options(self.tx_options))?;
        out.push(nodes.len() as u8);
        out.extend_from_slice(&nodes);
        out.push(cc.len() as u8);
        out.extend(cc);
        out.push(self.tx_options.bits());
        out.push(callback_id);
        Ok(())
    }
}

pub(crate) fn require_callback_id(callback_id: Option<u8>) -> Result<u8> {
    callback_id.ok_or_else(|| MessageError::Argument("callback id is required but not set".into()))
}

fn check_cc_len(len: usize, max: usize) -> Result<()> {
    if len > max {
        return Err(MessageError::Argument(format!(
            "{len} byte command exceeds the {max} byte frame budget"
        )));
    }
    Ok(())
}
