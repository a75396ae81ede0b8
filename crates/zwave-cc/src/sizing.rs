//! How many CC bytes fit into one SendData frame.

use std::fmt;
use std::ops::BitOr;

use serde::{Deserialize, Serialize};

use crate::command_class::CommandClass;

/// SendData transmit option bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransmitOptions(u8);

impl TransmitOptions {
    pub const NONE: Self = Self(0x00);
    pub const ACK: Self = Self(0x01);
    pub const LOW_POWER: Self = Self(0x02);
    pub const AUTO_ROUTE: Self = Self(0x04);
    pub const NO_ROUTE: Self = Self(0x10);
    pub const EXPLORE: Self = Self(0x20);
    /// ACK, auto route and explore.
    pub const DEFAULT: Self = Self(0x25);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

impl Default for TransmitOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl BitOr for TransmitOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Debug for TransmitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransmitOptions(0x{:02x})", self.0)
    }
}

pub const MAX_PAYLOAD_EXPLORE: usize = 46;
pub const MAX_PAYLOAD_AUTO_ROUTE: usize = 48;
pub const MAX_PAYLOAD_DIRECT: usize = 54;

/// Largest CC (header included) a single SendData can carry.
pub fn max_payload_for_tx_options(options: TransmitOptions) -> usize {
    if options.contains(TransmitOptions::EXPLORE) {
        MAX_PAYLOAD_EXPLORE
    } else if options.contains(TransmitOptions::AUTO_ROUTE) {
        MAX_PAYLOAD_AUTO_ROUTE
    } else {
        MAX_PAYLOAD_DIRECT
    }
}

/// Bytes left for the innermost CC's own payload once every header and
/// encapsulation trailer on the way down has been paid for.
///
/// A Multi Command bundle ends the descent; its per-command length bytes
/// are charged and the bundled commands share what remains.
pub fn compute_net_cc_payload_size(max_payload: usize, cc: &CommandClass) -> usize {
    let overhead: usize = cc
        .layers()
        .map(|layer| {
            layer.header_len() + layer.as_encapsulating().map_or(0, |e| e.extra_overhead())
        })
        .sum();
    max_payload.saturating_sub(overhead)
}
