//! Controller identity and capability queries.

use serde::Serialize;
use zwave_cc::payload::{encode_bitmask, parse_bitmask};
use zwave_cc::{NodeId, PayloadReader};

use crate::error::{MessageError, Result};

/// Highest classic node id.
pub const MAX_NODES: u16 = 232;
/// Bytes in a node bitmask covering every classic node.
pub const NODE_BITMASK_LEN: usize = 29;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControllerVersion {
    /// e.g. "Z-Wave 6.07"
    pub version: String,
    pub library_type: u8,
}

impl ControllerVersion {
    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        let end = payload
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| MessageError::InvalidPayload("unterminated version string".into()))?;
        let library_type = *payload
            .get(end + 1)
            .ok_or_else(|| MessageError::InvalidPayload("missing library type".into()))?;
        Ok(Self {
            version: String::from_utf8_lossy(&payload[..end]).into_owned(),
            library_type,
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.version.as_bytes());
        out.push(0);
        out.push(self.library_type);
    }
}

const CAP_SLAVE_API: u8 = 0x01;
const CAP_TIMER_FUNCTIONS: u8 = 0x02;
const CAP_SECONDARY: u8 = 0x04;
const CAP_STATIC_UPDATE_CONTROLLER: u8 = 0x08;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialApiInitData {
    pub api_version: u8,
    pub capabilities: u8,
    pub node_ids: Vec<NodeId>,
    pub chip_type: Option<u8>,
    pub chip_version: Option<u8>,
}

impl SerialApiInitData {
    pub fn is_slave_api(&self) -> bool {
        self.capabilities & CAP_SLAVE_API != 0
    }

    pub fn supports_timer_functions(&self) -> bool {
        self.capabilities & CAP_TIMER_FUNCTIONS != 0
    }

    pub fn is_secondary(&self) -> bool {
        self.capabilities & CAP_SECONDARY != 0
    }

    pub fn is_static_update_controller(&self) -> bool {
        self.capabilities & CAP_STATIC_UPDATE_CONTROLLER != 0
    }

    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let api_version = reader.u8()?;
        let capabilities = reader.u8()?;
        let mask_len = reader.u8()? as usize;
        let node_ids = parse_node_bitmask(reader.bytes(mask_len)?)?;
        Ok(Self {
            api_version,
            capabilities,
            node_ids,
            chip_type: reader.optional_u8(),
            chip_version: reader.optional_u8(),
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.api_version);
        out.push(self.capabilities);
        out.push(NODE_BITMASK_LEN as u8);
        out.extend(encode_node_bitmask(&self.node_ids));
        if let Some(chip_type) = self.chip_type {
            out.push(chip_type);
            if let Some(chip_version) = self.chip_version {
                out.push(chip_version);
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControllerId {
    pub home_id: u32,
    pub own_node_id: NodeId,
}

impl ControllerId {
    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        let home_id = u32::from_be_bytes(reader.array()?);
        Ok(Self {
            home_id,
            own_node_id: reader.u8()?,
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.home_id.to_be_bytes());
        out.push(self.own_node_id);
    }
}

pub(crate) fn parse_node_bitmask(mask: &[u8]) -> Result<Vec<NodeId>> {
    parse_bitmask(mask, 1)
        .into_iter()
        .filter(|node| *node <= MAX_NODES)
        .map(|node| {
            NodeId::try_from(node)
                .map_err(|_| MessageError::InvalidPayload(format!("node id {node}")))
        })
        .collect()
}

pub(crate) fn encode_node_bitmask(nodes: &[NodeId]) -> Vec<u8> {
    let values: Vec<u16> = nodes.iter().map(|node| u16::from(*node)).collect();
    encode_bitmask(&values, MAX_NODES, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string() {
        let payload = b"Z-Wave 6.07\0\x01";
        let version = ControllerVersion::parse(payload).unwrap();
        assert_eq!(version.version, "Z-Wave 6.07");
        assert_eq!(version.library_type, 1);
        let mut out = Vec::new();
        version.encode(&mut out);
        assert_eq!(out, payload);

        assert!(ControllerVersion::parse(b"Z-Wave").is_err());
    }

    #[test]
    fn init_data_node_list() {
        let mut payload = vec![0x05, 0x08, 0x1D, 0b0000_0111];
        payload.extend([0u8; 28]);
        payload.extend([0x07, 0x00]);
        let data = SerialApiInitData::parse(&payload).unwrap();
        assert_eq!(data.node_ids, vec![1, 2, 3]);
        assert!(data.is_static_update_controller());
        assert!(!data.is_secondary());
        assert_eq!(data.chip_type, Some(7));

        let mut out = Vec::new();
        data.encode(&mut out);
        assert_eq!(out, payload);
    }

    #[test]
    fn node_bitmask_covers_all_nodes() {
        let mask = encode_node_bitmask(&[1, 232]);
        assert_eq!(mask.len(), NODE_BITMASK_LEN);
        assert_eq!(parse_node_bitmask(&mask).unwrap(), vec![1, 232]);
    }

    #[test]
    fn controller_id() {
        let id = ControllerId::parse(&[0xC0, 0xFF, 0xEE, 0x01, 0x01]).unwrap();
        assert_eq!(id.home_id, 0xC0FF_EE01);
        assert_eq!(id.own_node_id, 1);
    }
}
