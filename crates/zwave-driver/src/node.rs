//! Per-node communication state.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use zwave_cc::cc::thermostat_setpoint::{InterpretationProbe, SetpointInterpretation};
use zwave_cc::NodeId;
use zwave_config::DeviceConfig;
use zwave_message::Message;

use crate::transaction::{Transaction, TransactionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Unknown,
    Alive,
    Asleep,
    Dead,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Alive => "alive",
            Self::Asleep => "asleep",
            Self::Dead => "dead",
        })
    }
}

/// A message to send to a node once `due` has passed.
#[derive(Debug, Clone)]
pub struct ScheduledPoll {
    pub due: Instant,
    pub message: Message,
}

#[derive(Debug, Default)]
pub struct NodeState {
    pub status: NodeStatus,
    /// Battery powered and not FLiRS: needs a wake-up before it hears us.
    pub can_sleep: bool,
    /// Set by a Wake Up Notification until Wake Up No More Information
    /// has been queued.
    pub(crate) awake_session: bool,
    pub(crate) consecutive_failures: u8,
    versions: HashMap<(u8, u16), u8>,
    parked: Vec<Transaction>,
    polls: Vec<ScheduledPoll>,
    device: Option<DeviceConfig>,
    setpoint_probe: Option<InterpretationProbe>,
}

impl NodeState {
    pub fn device(&self) -> Option<&DeviceConfig> {
        self.device.as_ref()
    }

    pub fn parked(&self) -> &[Transaction] {
        &self.parked
    }

    pub fn scheduled_polls(&self) -> &[ScheduledPoll] {
        &self.polls
    }

    pub fn cc_version(&self, endpoint: u8, cc_id: u16) -> Option<u8> {
        self.versions
            .get(&(endpoint, cc_id))
            .or_else(|| self.versions.get(&(0, cc_id)))
            .copied()
    }

    /// Device file override first, then whatever the probe settled on.
    pub fn setpoint_interpretation(&self) -> SetpointInterpretation {
        self.device
            .as_ref()
            .and_then(|device| device.compat.setpoint_interpretation)
            .or_else(|| self.setpoint_probe.as_ref().map(|probe| probe.interpretation()))
            .unwrap_or_default()
    }

    /// Device files may stretch the report timeout of slow devices.
    pub fn report_timeout(&self, default: Duration) -> Duration {
        self.device
            .as_ref()
            .and_then(|device| device.compat.report_timeout())
            .unwrap_or(default)
    }

    pub fn sends_no_more_information(&self) -> bool {
        !self
            .device
            .as_ref()
            .is_some_and(|device| device.compat.no_wake_up_no_more_information)
    }

    pub fn has_pending_messages(&self) -> bool {
        !self.parked.is_empty() || !self.polls.is_empty()
    }
}

/// All nodes the engine has heard of. Unknown nodes are created on first
/// touch in [`NodeStatus::Unknown`].
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: BTreeMap<NodeId, NodeState>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: NodeId) -> Option<&NodeState> {
        self.nodes.get(&node)
    }

    pub fn entry(&mut self, node: NodeId) -> &mut NodeState {
        self.nodes.entry(node).or_default()
    }

    pub fn status(&self, node: NodeId) -> NodeStatus {
        self.nodes
            .get(&node)
            .map(|state| state.status)
            .unwrap_or_default()
    }

    /// Returns true if the status changed.
    pub fn set_status(&mut self, node: NodeId, status: NodeStatus) -> bool {
        let state = self.entry(node);
        let changed = state.status != status;
        state.status = status;
        changed
    }

    pub fn set_can_sleep(&mut self, node: NodeId, can_sleep: bool) {
        self.entry(node).can_sleep = can_sleep;
    }

    pub fn can_sleep(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|state| state.can_sleep)
    }

    /// Whether a retry-worthy message, including a scheduled poll, is
    /// outstanding for `node`.
    pub fn has_pending_messages(&self, node: NodeId) -> bool {
        self.nodes
            .get(&node)
            .is_some_and(NodeState::has_pending_messages)
    }

    pub fn park(&mut self, node: NodeId, tx: Transaction) {
        self.entry(node).parked.push(tx);
    }

    /// Parked transactions in the order they were parked.
    pub fn take_parked(&mut self, node: NodeId) -> Vec<Transaction> {
        self.nodes
            .get_mut(&node)
            .map(|state| std::mem::take(&mut state.parked))
            .unwrap_or_default()
    }

    pub fn remove_parked(&mut self, id: TransactionId) -> Option<Transaction> {
        self.nodes.values_mut().find_map(|state| {
            let index = state.parked.iter().position(|tx| tx.id == id)?;
            Some(state.parked.remove(index))
        })
    }

    pub fn take_all_parked(&mut self) -> Vec<Transaction> {
        self.nodes
            .values_mut()
            .flat_map(|state| std::mem::take(&mut state.parked))
            .collect()
    }

    pub fn schedule_poll(&mut self, node: NodeId, message: Message, due: Instant) {
        self.entry(node).polls.push(ScheduledPoll { due, message });
    }

    /// Remove and return every poll that is due, in node order.
    pub fn take_due_polls(&mut self, now: Instant) -> Vec<ScheduledPoll> {
        let mut due = Vec::new();
        for state in self.nodes.values_mut() {
            let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.polls)
                .into_iter()
                .partition(|poll| poll.due <= now);
            state.polls = waiting;
            due.extend(ready);
        }
        due
    }

    /// Drop polls for a node that will not answer them.
    pub fn clear_polls(&mut self, node: NodeId) -> usize {
        self.nodes
            .get_mut(&node)
            .map(|state| std::mem::take(&mut state.polls).len())
            .unwrap_or(0)
    }

    pub fn next_poll_due(&self) -> Option<Instant> {
        self.nodes
            .values()
            .flat_map(|state| state.polls.iter().map(|poll| poll.due))
            .min()
    }

    pub fn set_cc_version(&mut self, node: NodeId, endpoint: u8, cc_id: u16, version: u8) {
        self.entry(node).versions.insert((endpoint, cc_id), version);
    }

    pub fn set_device(&mut self, node: NodeId, device: DeviceConfig) {
        self.entry(node).device = Some(device);
    }

    /// Start guessing the setpoint layout from a Supported Report bitmask.
    pub fn start_setpoint_probe(&mut self, node: NodeId, bitmask: &[u8]) {
        self.entry(node).setpoint_probe = Some(InterpretationProbe::new(bitmask));
    }

    pub fn setpoint_probe_mut(&mut self, node: NodeId) -> Option<&mut InterpretationProbe> {
        self.nodes
            .get_mut(&node)
            .and_then(|state| state.setpoint_probe.as_mut())
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &NodeState)> {
        self.nodes.iter().map(|(node, state)| (*node, state))
    }
}

#[cfg(test)]
mod tests {
    use zwave_cc::cc::basic::BasicCommand;
    use zwave_cc::CommandClass;
    use zwave_message::SendDataRequest;

    use super::*;

    fn get(node: NodeId) -> Message {
        SendDataRequest::new(CommandClass::new(node, BasicCommand::Get)).into()
    }

    #[test]
    fn pending_messages_include_polls() {
        let mut nodes = NodeRegistry::new();
        let now = Instant::now();
        assert!(!nodes.has_pending_messages(5));

        nodes.schedule_poll(5, get(5), now + Duration::from_secs(5));
        assert!(nodes.has_pending_messages(5));
        assert!(nodes.take_due_polls(now).is_empty());
        assert_eq!(nodes.next_poll_due(), Some(now + Duration::from_secs(5)));

        let due = nodes.take_due_polls(now + Duration::from_secs(5));
        assert_eq!(due.len(), 1);
        assert!(!nodes.has_pending_messages(5));
    }

    #[test]
    fn parked_transactions_count_as_pending() {
        let mut nodes = NodeRegistry::new();
        let tx = Transaction::new(9, 0, get(3), None, Instant::now());
        nodes.park(3, tx);
        assert!(nodes.has_pending_messages(3));
        assert_eq!(nodes.remove_parked(9).map(|tx| tx.id), Some(9));
        assert!(!nodes.has_pending_messages(3));
    }

    #[test]
    fn status_changes_are_reported_once() {
        let mut nodes = NodeRegistry::new();
        assert_eq!(nodes.status(4), NodeStatus::Unknown);
        assert!(nodes.set_status(4, NodeStatus::Alive));
        assert!(!nodes.set_status(4, NodeStatus::Alive));
    }

    #[test]
    fn endpoint_versions_fall_back_to_root() {
        let mut nodes = NodeRegistry::new();
        nodes.set_cc_version(2, 0, 0x25, 2);
        let state = nodes.get(2).unwrap();
        assert_eq!(state.cc_version(1, 0x25), Some(2));
        assert_eq!(state.cc_version(0, 0x26), None);
    }

    #[test]
    fn probe_decides_interpretation() {
        let mut nodes = NodeRegistry::new();
        nodes.start_setpoint_probe(7, &[0b0000_1110]);
        assert_eq!(
            nodes.get(7).unwrap().setpoint_interpretation(),
            SetpointInterpretation::A
        );
        nodes.setpoint_probe_mut(7).unwrap().on_timeout(7);
        nodes.setpoint_probe_mut(7).unwrap().on_timeout(8);
        assert_eq!(
            nodes.get(7).unwrap().setpoint_interpretation(),
            SetpointInterpretation::B
        );
    }
}
