use std::collections::BTreeMap;

use zwave_cc::NodeId;
use zwave_message::MessagePriority;

use crate::transaction::{Transaction, TransactionId};

/// Pending transactions in priority order, FIFO within a priority.
#[derive(Debug, Default)]
pub struct TransactionQueue {
    entries: BTreeMap<(MessagePriority, u64), Transaction>,
}

impl TransactionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert at the position given by the transaction's priority and
    /// sequence number.
    pub fn push(&mut self, tx: Transaction) {
        self.entries.insert((tx.priority, tx.seq), tx);
    }

    pub fn pop(&mut self) -> Option<Transaction> {
        self.entries.pop_first().map(|(_, tx)| tx)
    }

    pub fn peek(&self) -> Option<&Transaction> {
        self.entries.values().next()
    }

    pub fn remove(&mut self, id: TransactionId) -> Option<Transaction> {
        let key = self
            .entries
            .iter()
            .find(|(_, tx)| tx.id == id)
            .map(|(key, _)| *key)?;
        self.entries.remove(&key)
    }

    /// Take every transaction that must wait for `node`, in queue order.
    pub fn drain_for_node(&mut self, node: NodeId) -> Vec<Transaction> {
        let keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, tx)| tx.target_node() == Some(node))
            .map(|(key, _)| *key)
            .collect();
        keys.iter()
            .filter_map(|key| self.entries.remove(key))
            .collect()
    }

    pub fn has_node(&self, node: NodeId) -> bool {
        self.entries
            .values()
            .any(|tx| tx.target_node() == Some(node))
    }

    pub fn drain(&mut self) -> Vec<Transaction> {
        std::mem::take(&mut self.entries).into_values().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use zwave_cc::cc::basic::BasicCommand;
    use zwave_cc::CommandClass;
    use zwave_message::{Message, SendDataRequest};

    use super::*;

    fn tx(id: TransactionId, node: u8, priority: MessagePriority) -> Transaction {
        let message: Message =
            SendDataRequest::new(CommandClass::new(node, BasicCommand::Get)).into();
        Transaction::new(id, id, message, Some(priority), Instant::now())
    }

    #[test]
    fn priority_then_fifo() {
        let mut queue = TransactionQueue::new();
        queue.push(tx(1, 2, MessagePriority::Normal));
        queue.push(tx(2, 2, MessagePriority::Poll));
        queue.push(tx(3, 2, MessagePriority::Controller));
        queue.push(tx(4, 2, MessagePriority::Normal));
        queue.push(tx(5, 2, MessagePriority::Nonce));

        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|tx| tx.id).collect();
        assert_eq!(order, vec![5, 3, 1, 4, 2]);
    }

    #[test]
    fn requeued_transaction_keeps_its_place() {
        let mut queue = TransactionQueue::new();
        queue.push(tx(1, 2, MessagePriority::Normal));
        queue.push(tx(2, 3, MessagePriority::Normal));
        queue.push(tx(3, 2, MessagePriority::Normal));

        let parked = queue.drain_for_node(2);
        assert_eq!(parked.iter().map(|tx| tx.id).collect::<Vec<_>>(), vec![1, 3]);
        assert!(!queue.has_node(2));

        queue.push(tx(4, 3, MessagePriority::Normal));
        for tx in parked {
            queue.push(tx);
        }
        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|tx| tx.id).collect();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn remove_by_id() {
        let mut queue = TransactionQueue::new();
        queue.push(tx(1, 2, MessagePriority::Normal));
        queue.push(tx(2, 2, MessagePriority::Normal));
        assert_eq!(queue.remove(1).map(|tx| tx.id), Some(1));
        assert!(queue.remove(1).is_none());
        assert_eq!(queue.len(), 1);
    }
}
