use serde::Serialize;

use crate::cc::unknown_command;
use crate::command_class::{Command, CommandClass, EncodeScope, ParseScope};
use crate::error::{CcError, Result};
use crate::ids;
use crate::payload::crc16;
use crate::traits::{Encapsulated, Encapsulating};
use crate::validate_payload;

const COMMAND_ENCAPSULATION: u8 = 0x01;
const CHECKSUM_LEN: usize = 2;

/// CRC-16 covers the CC id and command bytes as well as the inner CC.
fn checksum(inner: &[u8]) -> u16 {
    let mut covered = Vec::with_capacity(inner.len() + 2);
    covered.push(ids::CRC16_ENCAPSULATION as u8);
    covered.push(COMMAND_ENCAPSULATION);
    covered.extend_from_slice(inner);
    crc16(&covered)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Crc16Command {
    CommandEncapsulation { encapsulated: Box<CommandClass> },
}

impl Crc16Command {
    pub fn encapsulate(cc: CommandClass) -> CommandClass {
        CommandClass {
            node: cc.node.clone(),
            endpoint: cc.endpoint,
            version: 1,
            command: Command::Crc16(Self::CommandEncapsulation {
                encapsulated: Box::new(cc),
            }),
        }
    }

    pub fn command_id(&self) -> u8 {
        COMMAND_ENCAPSULATION
    }

    pub(crate) fn parse(command: u8, body: &[u8], scope: &ParseScope<'_>) -> Result<Self> {
        if command != COMMAND_ENCAPSULATION {
            return Err(unknown_command(ids::CRC16_ENCAPSULATION, command));
        }
        validate_payload!(body.len() > CHECKSUM_LEN);
        let (inner, trailer) = body.split_at(body.len() - CHECKSUM_LEN);
        let expected = u16::from_be_bytes([trailer[0], trailer[1]]);
        let actual = checksum(inner);
        if expected != actual {
            return Err(CcError::InvalidPayload(format!(
                "CRC-16 mismatch: expected 0x{expected:04x}, computed 0x{actual:04x}"
            )));
        }
        // Checked bytes are still parsed under the same rules as unwrapped ones.
        let encapsulated = scope.parse_inner(inner, scope.endpoint)?;
        Ok(Self::CommandEncapsulation {
            encapsulated: Box::new(encapsulated),
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>, scope: &EncodeScope<'_>) -> Result<()> {
        let Self::CommandEncapsulation { encapsulated } = self;
        let inner = CommandClass::serialize(encapsulated, scope.ctx)?;
        let crc = checksum(&inner);
        out.extend(inner);
        out.extend_from_slice(&crc.to_be_bytes());
        Ok(())
    }
}

impl Encapsulating for Crc16Command {
    fn encapsulated(&self) -> Vec<&CommandClass> {
        let Self::CommandEncapsulation { encapsulated } = self;
        vec![encapsulated.as_ref()]
    }

    fn encapsulated_mut(&mut self) -> Encapsulated<'_, CommandClass> {
        let Self::CommandEncapsulation { encapsulated } = self;
        Encapsulated::One(encapsulated.as_mut())
    }

    fn extra_overhead(&self) -> usize {
        CHECKSUM_LEN
    }
}
