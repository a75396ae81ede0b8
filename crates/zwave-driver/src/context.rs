use std::sync::Arc;

use zwave_cc::cc::thermostat_setpoint::SetpointInterpretation;
use zwave_cc::{CcContext, NodeId, SecurityManager};

use crate::node::NodeRegistry;

/// Parse context backed by what the engine has learned about each node.
pub struct DriverContext<'a> {
    pub own_node_id: NodeId,
    pub nodes: &'a NodeRegistry,
    pub security: Option<&'a Arc<dyn SecurityManager>>,
}

impl CcContext for DriverContext<'_> {
    fn own_node_id(&self) -> NodeId {
        self.own_node_id
    }

    fn cc_version(&self, node: NodeId, endpoint: u8, cc_id: u16) -> u8 {
        self.nodes
            .get(node)
            .and_then(|state| state.cc_version(endpoint, cc_id))
            .unwrap_or(1)
    }

    fn security_manager(&self) -> Option<&dyn SecurityManager> {
        self.security.map(|manager| manager.as_ref())
    }

    fn setpoint_interpretation(&self, node: NodeId) -> SetpointInterpretation {
        self.nodes
            .get(node)
            .map(|state| state.setpoint_interpretation())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_nodes_use_defaults() {
        let mut nodes = NodeRegistry::new();
        nodes.set_cc_version(3, 0, 0x86, 3);
        let ctx = DriverContext {
            own_node_id: 1,
            nodes: &nodes,
            security: None,
        };
        assert_eq!(ctx.cc_version(3, 0, 0x86), 3);
        assert_eq!(ctx.cc_version(9, 0, 0x86), 1);
        assert_eq!(ctx.setpoint_interpretation(9), SetpointInterpretation::A);
        assert!(ctx.security_manager().is_none());
    }
}
