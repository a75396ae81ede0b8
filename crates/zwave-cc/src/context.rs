use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::cc::thermostat_setpoint::SetpointInterpretation;
use crate::error::Result;

/// Node ids on a classic Z-Wave network fit in one byte.
pub type NodeId = u8;

/// Node id that addresses every node.
pub const NODE_ID_BROADCAST: NodeId = 0xFF;

/// How a command is addressed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "mode", content = "nodes", rename_all = "lowercase")]
pub enum Destination {
    Singlecast(NodeId),
    Multicast(Vec<NodeId>),
    Broadcast,
}

impl Destination {
    /// The single node this addresses, if any.
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Self::Singlecast(node) => Some(*node),
            _ => None,
        }
    }

    pub fn is_singlecast(&self) -> bool {
        matches!(self, Self::Singlecast(_))
    }

    /// Whether `node` is one of the addressed nodes.
    pub fn includes(&self, node: NodeId) -> bool {
        match self {
            Self::Singlecast(id) => *id == node,
            Self::Multicast(ids) => ids.contains(&node),
            Self::Broadcast => true,
        }
    }
}

impl From<NodeId> for Destination {
    fn from(node: NodeId) -> Self {
        if node == NODE_ID_BROADCAST {
            Self::Broadcast
        } else {
            Self::Singlecast(node)
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Singlecast(node) => write!(f, "node {node}"),
            Self::Multicast(nodes) => write!(f, "nodes {nodes:?}"),
            Self::Broadcast => f.write_str("broadcast"),
        }
    }
}

/// Security S0 encrypted payload as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct S0Ciphertext {
    pub iv: [u8; 8],
    pub ciphertext: Vec<u8>,
    pub nonce_id: u8,
    pub mac: [u8; 8],
}

/// Key material and nonce handling for Security S0.
///
/// The codec only frames and unframes; the manager owns the keys, the
/// nonce tables and the actual cipher. Plaintext starts with the
/// sequencing byte followed by the encapsulated CC.
pub trait SecurityManager: Send + Sync {
    /// Authenticate and decrypt a payload received from `node`.
    fn decrypt(&self, node: NodeId, cc_command: u8, payload: &S0Ciphertext) -> Result<Vec<u8>>;

    /// Encrypt a plaintext for `node` using a nonce previously received from it.
    fn encrypt(&self, node: NodeId, plaintext: &[u8]) -> Result<S0Ciphertext>;
}

/// Read-only context consulted while parsing and serializing CCs.
pub trait CcContext {
    /// The controller's own node id.
    fn own_node_id(&self) -> NodeId {
        1
    }

    /// Negotiated version of `cc_id` on a node's endpoint.
    fn cc_version(&self, _node: NodeId, _endpoint: u8, _cc_id: u16) -> u8 {
        1
    }

    fn security_manager(&self) -> Option<&dyn SecurityManager> {
        None
    }

    /// Bitmask layout of a node's Thermostat Setpoint Supported Report.
    fn setpoint_interpretation(&self, _node: NodeId) -> SetpointInterpretation {
        SetpointInterpretation::A
    }
}

/// A [`CcContext`] backed by plain maps. Used by the CLI decoder and tests.
#[derive(Clone, Default)]
pub struct StaticContext {
    pub own_node_id: NodeId,
    versions: HashMap<(NodeId, u8, u16), u8>,
    setpoint: HashMap<NodeId, SetpointInterpretation>,
    security: Option<Arc<dyn SecurityManager>>,
}

impl StaticContext {
    pub fn new(own_node_id: NodeId) -> Self {
        Self {
            own_node_id,
            ..Self::default()
        }
    }

    pub fn with_version(mut self, node: NodeId, endpoint: u8, cc_id: u16, version: u8) -> Self {
        self.versions.insert((node, endpoint, cc_id), version);
        self
    }

    pub fn with_security(mut self, manager: Arc<dyn SecurityManager>) -> Self {
        self.security = Some(manager);
        self
    }

    pub fn with_setpoint_interpretation(
        mut self,
        node: NodeId,
        interpretation: SetpointInterpretation,
    ) -> Self {
        self.setpoint.insert(node, interpretation);
        self
    }
}

impl fmt::Debug for StaticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticContext")
            .field("own_node_id", &self.own_node_id)
            .field("versions", &self.versions)
            .field("has_security", &self.security.is_some())
            .finish()
    }
}

impl CcContext for StaticContext {
    fn own_node_id(&self) -> NodeId {
        self.own_node_id
    }

    fn cc_version(&self, node: NodeId, endpoint: u8, cc_id: u16) -> u8 {
        self.versions
            .get(&(node, endpoint, cc_id))
            .copied()
            .unwrap_or(1)
    }

    fn security_manager(&self) -> Option<&dyn SecurityManager> {
        self.security.as_deref()
    }

    fn setpoint_interpretation(&self, node: NodeId) -> SetpointInterpretation {
        self.setpoint
            .get(&node)
            .copied()
            .unwrap_or(SetpointInterpretation::A)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destination_from_node_id() {
        assert_eq!(Destination::from(5), Destination::Singlecast(5));
        assert_eq!(Destination::from(NODE_ID_BROADCAST), Destination::Broadcast);
        assert!(Destination::Multicast(vec![2, 3]).includes(3));
        assert!(!Destination::Singlecast(2).includes(3));
        assert_eq!(Destination::Broadcast.node_id(), None);
    }

    #[test]
    fn static_context_versions_default_to_one() {
        let ctx = StaticContext::new(1).with_version(5, 0, 0x86, 3);
        assert_eq!(ctx.cc_version(5, 0, 0x86), 3);
        assert_eq!(ctx.cc_version(5, 1, 0x86), 1);
        assert!(ctx.security_manager().is_none());
    }
}
