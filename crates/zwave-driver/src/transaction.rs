use std::time::Instant;

use serde::Serialize;
use zwave_cc::NodeId;
use zwave_message::{Message, MessageKind, MessagePriority};

pub type TransactionId = u64;

/// One queued send and everything needed to see it through.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: TransactionId,
    pub message: Message,
    pub priority: MessagePriority,
    /// Position within its priority. Kept when the transaction is parked
    /// and re-queued, so it goes back to where it was.
    pub(crate) seq: u64,
    /// Attempts started so far.
    pub(crate) attempts: u8,
    pub(crate) enqueued_at: Instant,
    /// Sending this puts the node back to sleep.
    pub(crate) ends_wake_up: bool,
}

impl Transaction {
    pub(crate) fn new(
        id: TransactionId,
        seq: u64,
        message: Message,
        priority: Option<MessagePriority>,
        now: Instant,
    ) -> Self {
        let priority = priority.unwrap_or_else(|| message.default_priority());
        Self {
            id,
            message,
            priority,
            seq,
            attempts: 0,
            enqueued_at: now,
            ends_wake_up: false,
        }
    }

    pub fn max_attempts(&self) -> u8 {
        self.message.max_send_attempts()
    }

    /// The node that must be awake for this transaction to run.
    pub fn target_node(&self) -> Option<NodeId> {
        match self.message.kind() {
            MessageKind::SendData | MessageKind::RequestNodeInfo => self.message.node_id(),
            _ => None,
        }
    }

    /// Whether the controller is still busy on the radio for this message
    /// until its callback arrives, so a missing callback calls for an abort.
    pub(crate) fn needs_abort_on_missing_callback(&self) -> bool {
        matches!(
            self.message.kind(),
            MessageKind::SendData | MessageKind::SendDataMulticast
        )
    }
}

/// Everything the controller and the node sent back for a transaction.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TransactionOutcome {
    pub response: Option<Message>,
    pub callback: Option<Message>,
    pub node_update: Option<Message>,
}

impl TransactionOutcome {
    /// The most specific reply: node report, then callback, then response.
    pub fn last_message(&self) -> Option<&Message> {
        self.node_update
            .as_ref()
            .or(self.callback.as_ref())
            .or(self.response.as_ref())
    }
}

/// Where the engine stands with its single active transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Idle,
    /// Talking to the controller: ACK, response, callback or a retry pause.
    Sending,
    /// The controller is done; waiting for the node's report.
    WaitingForNode,
}
