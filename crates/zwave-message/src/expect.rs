use std::fmt;

use crate::kind::MessageKind;
use crate::message::Message;

/// Predicate deciding whether `candidate` completes `sent`.
pub type MatchFn = fn(sent: &Message, candidate: &Message) -> bool;

/// What a sent message waits for, as a response or as a callback.
#[derive(Clone, Copy)]
pub enum Expectation {
    /// A message of this kind; callback ids must agree when both carry one.
    Kind(MessageKind),
    Predicate(MatchFn),
}

impl Expectation {
    pub fn matches(&self, sent: &Message, candidate: &Message) -> bool {
        match self {
            Self::Kind(kind) => {
                candidate.kind() == *kind
                    && match (sent.callback_id(), candidate.callback_id()) {
                        (Some(sent_id), Some(candidate_id)) => sent_id == candidate_id,
                        _ => true,
                    }
            }
            Self::Predicate(predicate) => predicate(sent, candidate),
        }
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}
