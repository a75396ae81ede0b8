use serde::Serialize;

use crate::cc::unknown_command;
use crate::command_class::{Command, CommandClass, EncodeScope, ParseScope};
use crate::error::{CcError, Result};
use crate::ids;
use crate::payload::PayloadReader;
use crate::traits::{Encapsulated, Encapsulating};
use crate::validate_payload;

const COMMAND_ENCAPSULATION: u8 = 0x01;

/// Bundles several complete commands into one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MultiCommandCommand {
    CommandEncapsulation { commands: Vec<CommandClass> },
}

impl MultiCommandCommand {
    pub fn bundle(commands: Vec<CommandClass>) -> Result<CommandClass> {
        let Some(first) = commands.first() else {
            return Err(CcError::Argument("cannot bundle zero commands".into()));
        };
        if commands.iter().any(|cc| cc.node != first.node) {
            return Err(CcError::Argument(
                "bundled commands must share one destination".into(),
            ));
        }
        Ok(CommandClass {
            node: first.node.clone(),
            endpoint: first.endpoint,
            version: 1,
            command: Command::MultiCommand(Self::CommandEncapsulation { commands }),
        })
    }

    pub fn command_id(&self) -> u8 {
        COMMAND_ENCAPSULATION
    }

    pub(crate) fn parse(command: u8, body: &[u8], scope: &ParseScope<'_>) -> Result<Self> {
        if command != COMMAND_ENCAPSULATION {
            return Err(unknown_command(ids::MULTI_COMMAND, command));
        }
        let mut reader = PayloadReader::new(body);
        let count = reader.u8()?;
        validate_payload!(count > 0);
        let mut commands = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let len = reader.u8()? as usize;
            validate_payload!(len > 0);
            commands.push(scope.parse_inner(reader.bytes(len)?, scope.endpoint)?);
        }
        Ok(Self::CommandEncapsulation { commands })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>, scope: &EncodeScope<'_>) -> Result<()> {
        let Self::CommandEncapsulation { commands } = self;
        let count = u8::try_from(commands.len())
            .map_err(|_| CcError::Arithmetic(format!("{} commands in one bundle", commands.len())))?;
        out.push(count);
        for cc in commands {
            let bytes = cc.serialize(scope.ctx)?;
            let len = u8::try_from(bytes.len()).map_err(|_| {
                CcError::Arithmetic(format!("bundled command of {} bytes", bytes.len()))
            })?;
            out.push(len);
            out.extend(bytes);
        }
        Ok(())
    }
}

impl Encapsulating for MultiCommandCommand {
    fn encapsulated(&self) -> Vec<&CommandClass> {
        let Self::CommandEncapsulation { commands } = self;
        commands.iter().collect()
    }

    fn encapsulated_mut(&mut self) -> Encapsulated<'_, CommandClass> {
        let Self::CommandEncapsulation { commands } = self;
        Encapsulated::Many(commands)
    }

    fn extra_overhead(&self) -> usize {
        let Self::CommandEncapsulation { commands } = self;
        1 + commands.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::basic::BasicCommand;
    use crate::cc::test_support::{ctx, reencode};
    use crate::cc::wake_up::WakeUpCommand;

    #[test]
    fn bundle_of_two() {
        let cc = reencode(&[0x8F, 0x01, 0x02, 0x03, 0x20, 0x03, 0x10, 0x02, 0x84, 0x07]);
        let inner = cc.as_encapsulating().unwrap().encapsulated();
        assert_eq!(inner.len(), 2);
        assert_eq!(inner[1].command, Command::WakeUp(WakeUpCommand::Notification));
        assert_eq!(cc.innermost(), &cc);
    }

    #[test]
    fn length_past_end_is_invalid() {
        let err = CommandClass::parse(&[0x8F, 0x01, 0x01, 0x05, 0x20, 0x02], 2, &ctx()).unwrap_err();
        assert!(matches!(err, CcError::InvalidPayload(_)));
    }

    #[test]
    fn bundle_requires_common_destination() {
        let a = CommandClass::new(2u8, BasicCommand::Get);
        let b = CommandClass::new(3u8, BasicCommand::Get);
        assert!(matches!(
            MultiCommandCommand::bundle(vec![a.clone(), b]),
            Err(CcError::Argument(_))
        ));
        let bundled = MultiCommandCommand::bundle(vec![a.clone(), a]).unwrap();
        assert_eq!(
            bundled.serialize(&ctx()).unwrap(),
            vec![0x8F, 0x01, 0x02, 0x02, 0x20, 0x02, 0x02, 0x20, 0x02]
        );
    }
}
