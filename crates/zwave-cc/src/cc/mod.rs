//! Command class families.
//!
//! Each module defines one sum type covering the commands of a family,
//! with a `parse` entry point registered in the CC registry and an
//! `encode` used by [`CommandClass::serialize`](crate::CommandClass::serialize).

pub mod association;
pub mod basic;
pub mod binary_switch;
pub mod crc16;
pub mod manufacturer_specific;
pub mod multi_channel;
pub mod multi_command;
pub mod multilevel_switch;
pub mod security;
pub mod supervision;
pub mod thermostat_setpoint;
pub mod version;
pub mod wake_up;

use serde::Serialize;

use crate::error::CcError;

/// A CC the codec carries without interpreting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawCommand {
    pub cc_id: u16,
    pub command: u8,
    pub payload: Vec<u8>,
}

impl RawCommand {
    pub fn new(cc_id: u16, command: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            cc_id,
            command,
            payload: payload.into(),
        }
    }
}

pub(crate) fn unknown_command(cc_id: u16, command: u8) -> CcError {
    CcError::not_implemented(cc_id, Some(command))
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::command_class::CommandClass;
    use crate::context::StaticContext;

    pub const NODE: u8 = 2;

    pub fn ctx() -> StaticContext {
        StaticContext::new(1)
    }

    pub fn parse(bytes: &[u8]) -> CommandClass {
        CommandClass::parse(bytes, NODE, &ctx()).unwrap()
    }

    /// Parse, check that encoding reproduces the input, and return the CC.
    pub fn reencode(bytes: &[u8]) -> CommandClass {
        let cc = parse(bytes);
        assert_eq!(cc.serialize(&ctx()).unwrap(), bytes, "re-encoding {cc}");
        cc
    }
}
