//! Partial-report reassembly.
//!
//! Some reports are split across several application commands. Each part
//! but the last says more are coming; the assembler holds the parts per
//! (node, CC, command) and folds them into the last one.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::command_class::CommandClass;
use crate::context::NodeId;
use crate::error::Result;
use crate::traits::Encapsulated;

/// Identifies one in-progress partial report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartialKey {
    pub node_id: NodeId,
    pub cc_id: u16,
    pub cc_command: u8,
}

/// What the assembler needs from a CC.
pub trait Assemble: Clone {
    fn partial_key(&self) -> PartialKey;

    fn expect_more_messages(&self) -> bool;

    fn merge_partial(&mut self, prior: Vec<Self>) -> Result<()>;

    fn encapsulated_mut(&mut self) -> Encapsulated<'_, Self>;
}

impl Assemble for CommandClass {
    fn partial_key(&self) -> PartialKey {
        PartialKey {
            node_id: self.node_id().unwrap_or_default(),
            cc_id: self.cc_id(),
            cc_command: self.cc_command().unwrap_or_default(),
        }
    }

    fn expect_more_messages(&self) -> bool {
        CommandClass::expect_more_messages(self)
    }

    fn merge_partial(&mut self, prior: Vec<Self>) -> Result<()> {
        CommandClass::merge_partial(self, prior)
    }

    fn encapsulated_mut(&mut self) -> Encapsulated<'_, Self> {
        CommandClass::encapsulated_mut(self)
    }
}

/// Result of feeding one CC to the assembler.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembly<C> {
    /// Ready for delivery, with any earlier parts merged in.
    Complete(C),
    /// Held back until the remaining parts arrive.
    Incomplete,
}

impl<C> Assembly<C> {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    pub fn into_complete(self) -> Option<C> {
        match self {
            Self::Complete(cc) => Some(cc),
            Self::Incomplete => None,
        }
    }
}

/// Accumulates partial reports until they can be merged.
#[derive(Debug)]
pub struct PartialAssembler<C = CommandClass> {
    parts: HashMap<PartialKey, Vec<C>>,
}

impl<C> Default for PartialAssembler<C> {
    fn default() -> Self {
        Self {
            parts: HashMap::new(),
        }
    }
}

impl<C: Assemble> PartialAssembler<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one received CC.
    ///
    /// Encapsulation is unwrapped down to the CC carrying data; a complete
    /// result keeps the original shells around the merged data. Multi
    /// Command bundles are always complete. A merge that fails with a soft
    /// decode error drops the parts and reports `Incomplete`; any other
    /// merge error is returned.
    pub fn assemble(&mut self, mut cc: C) -> Result<Assembly<C>> {
        if self.assemble_in_place(&mut cc)? {
            Ok(Assembly::Complete(cc))
        } else {
            Ok(Assembly::Incomplete)
        }
    }

    fn assemble_in_place(&mut self, cc: &mut C) -> Result<bool> {
        match cc.encapsulated_mut() {
            Encapsulated::One(inner) => return self.assemble_in_place(inner),
            Encapsulated::Many(inner) => {
                for part in inner.iter_mut() {
                    self.assemble_in_place(part)?;
                }
                return Ok(true);
            }
            Encapsulated::None => {}
        }

        let key = cc.partial_key();
        if cc.expect_more_messages() {
            let parts = self.parts.entry(key).or_default();
            parts.push(cc.clone());
            debug!(?key, held = parts.len(), "holding partial report");
            return Ok(false);
        }

        let Some(prior) = self.parts.remove(&key) else {
            return Ok(true);
        };
        match cc.merge_partial(prior) {
            Ok(()) => Ok(true),
            Err(err) if err.is_soft_merge_error() => {
                warn!(?key, error = %err, "dropping partial report that failed to merge");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Drop everything held for a node, e.g. when its transaction aborts.
    pub fn discard_for_node(&mut self, node_id: NodeId) -> usize {
        let before = self.parts.len();
        self.parts.retain(|key, _| key.node_id != node_id);
        before - self.parts.len()
    }

    pub fn discard(&mut self, key: &PartialKey) -> bool {
        self.parts.remove(key).is_some()
    }

    pub fn pending(&self, key: &PartialKey) -> usize {
        self.parts.get(key).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::association::AssociationCommand;
    use crate::cc::basic::BasicCommand;
    use crate::cc::multi_channel::MultiChannelCommand;
    use crate::cc::multi_command::MultiCommandCommand;
    use crate::command_class::Command;
    use crate::error::CcError;

    fn association(node: NodeId, reports_to_follow: u8, node_ids: Vec<NodeId>) -> CommandClass {
        CommandClass::new(
            node,
            AssociationCommand::Report {
                group_id: 1,
                max_nodes: 10,
                reports_to_follow,
                node_ids,
            },
        )
    }

    fn node_ids(cc: &CommandClass) -> Vec<NodeId> {
        match &cc.innermost().command {
            Command::Association(AssociationCommand::Report { node_ids, .. }) => node_ids.clone(),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn two_part_report_merges() {
        let mut assembler = PartialAssembler::new();
        assert_eq!(
            assembler.assemble(association(2, 1, vec![1, 2, 3])).unwrap(),
            Assembly::Incomplete
        );
        let merged = assembler
            .assemble(association(2, 0, vec![4, 5, 6]))
            .unwrap()
            .into_complete()
            .unwrap();
        assert_eq!(node_ids(&merged), vec![1, 2, 3, 4, 5, 6]);
        assert!(assembler.is_empty());
    }

    #[test]
    fn non_partial_cc_is_complete() {
        let mut assembler = PartialAssembler::new();
        let cc = CommandClass::new(2u8, BasicCommand::Get);
        assert_eq!(
            assembler.assemble(cc.clone()).unwrap(),
            Assembly::Complete(cc)
        );
    }

    #[test]
    fn parts_are_keyed_by_node() {
        let mut assembler = PartialAssembler::new();
        assembler.assemble(association(2, 1, vec![1])).unwrap();
        assembler.assemble(association(3, 1, vec![9])).unwrap();
        let merged = assembler
            .assemble(association(3, 0, vec![8]))
            .unwrap()
            .into_complete()
            .unwrap();
        assert_eq!(node_ids(&merged), vec![9, 8]);

        let key = association(2, 0, vec![]).partial_key();
        assert_eq!(assembler.pending(&key), 1);
        assert_eq!(assembler.discard_for_node(2), 1);
        assert!(assembler.is_empty());
    }

    #[test]
    fn multi_command_bundle_completes_in_one_step() {
        let mut assembler = PartialAssembler::new();
        let bundle = MultiCommandCommand::bundle(vec![
            CommandClass::new(2u8, BasicCommand::Get),
            association(2, 0, vec![1]),
        ])
        .unwrap();
        assert!(assembler.assemble(bundle).unwrap().is_complete());
        assert!(assembler.is_empty());
    }

    #[test]
    fn encapsulated_parts_keep_their_shell() {
        let mut assembler = PartialAssembler::new();
        let wrap = |cc: CommandClass| MultiChannelCommand::encapsulate(cc.with_endpoint(1));
        assert!(!assembler
            .assemble(wrap(association(2, 1, vec![1, 2])))
            .unwrap()
            .is_complete());
        let merged = assembler
            .assemble(wrap(association(2, 0, vec![3])))
            .unwrap()
            .into_complete()
            .unwrap();
        assert!(matches!(merged.command, Command::MultiChannel(_)));
        assert_eq!(node_ids(&merged), vec![1, 2, 3]);
    }

    #[derive(Debug, Clone)]
    struct Fake {
        more: bool,
        merge_error: Option<CcError>,
    }

    impl Assemble for Fake {
        fn partial_key(&self) -> PartialKey {
            PartialKey {
                node_id: 4,
                cc_id: 0x85,
                cc_command: 0x03,
            }
        }

        fn expect_more_messages(&self) -> bool {
            self.more
        }

        fn merge_partial(&mut self, _prior: Vec<Self>) -> Result<()> {
            match self.merge_error.clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }

        fn encapsulated_mut(&mut self) -> Encapsulated<'_, Self> {
            Encapsulated::None
        }
    }

    fn merge_with(err: CcError) -> Result<Assembly<Fake>> {
        let mut assembler = PartialAssembler::new();
        assembler.assemble(Fake {
            more: true,
            merge_error: None,
        })?;
        assembler.assemble(Fake {
            more: false,
            merge_error: Some(err),
        })
    }

    #[test]
    fn soft_merge_errors_report_incomplete() {
        for err in [
            CcError::DeserializationNotImplemented("x".into()),
            CcError::NotImplemented {
                cc_id: 0x85,
                command: None,
            },
            CcError::InvalidPayload("x".into()),
        ] {
            assert!(matches!(merge_with(err), Ok(Assembly::Incomplete)));
        }
    }

    #[test]
    fn other_merge_errors_propagate() {
        assert!(matches!(
            merge_with(CcError::Arithmetic("x".into())),
            Err(CcError::Arithmetic(_))
        ));
        assert!(matches!(
            merge_with(CcError::Decrypt("x".into())),
            Err(CcError::Decrypt(_))
        ));
    }
}
