use std::fmt;

use serde::{Deserialize, Serialize};

/// Queue priority. Lower values are sent first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MessagePriority {
    /// Security nonces expire within seconds.
    Nonce = 0,
    Controller = 1,
    /// Steps of a multi-message controller procedure.
    MultistepController = 2,
    Supervision = 3,
    /// Traffic for a node that just woke up.
    WakeUp = 4,
    #[default]
    Normal = 5,
    NodeQuery = 6,
    Poll = 7,
}

impl fmt::Display for MessagePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Nonce => "nonce",
            Self::Controller => "controller",
            Self::MultistepController => "multistep_controller",
            Self::Supervision => "supervision",
            Self::WakeUp => "wake_up",
            Self::Normal => "normal",
            Self::NodeQuery => "node_query",
            Self::Poll => "poll",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_sorts_first() {
        let mut priorities = vec![
            MessagePriority::Poll,
            MessagePriority::Normal,
            MessagePriority::Nonce,
            MessagePriority::Controller,
        ];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![
                MessagePriority::Nonce,
                MessagePriority::Controller,
                MessagePriority::Normal,
                MessagePriority::Poll,
            ]
        );
    }
}
