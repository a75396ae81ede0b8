use serde::Serialize;

use crate::cc::unknown_command;
use crate::command_class::{Command, CommandClass, EncodeScope, ParseScope};
use crate::error::{CcError, Result};
use crate::ids;
use crate::payload::{DurationValue, PayloadReader};
use crate::traits::{Encapsulated, Encapsulating};
use crate::validate_payload;

const GET: u8 = 0x01;
const REPORT: u8 = 0x02;

const SESSION_ID_MASK: u8 = 0x3F;
const STATUS_UPDATES: u8 = 0x80;
const MORE_UPDATES_FOLLOW: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisionStatus {
    NoSupport,
    Working,
    Fail,
    Success,
}

impl SupervisionStatus {
    fn parse(byte: u8) -> Result<Self> {
        Ok(match byte {
            0x00 => Self::NoSupport,
            0x01 => Self::Working,
            0x02 => Self::Fail,
            0xFF => Self::Success,
            other => {
                return Err(CcError::InvalidPayload(format!(
                    "unknown supervision status 0x{other:02x}"
                )))
            }
        })
    }

    fn encode(self) -> u8 {
        match self {
            Self::NoSupport => 0x00,
            Self::Working => 0x01,
            Self::Fail => 0x02,
            Self::Success => 0xFF,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SupervisionCommand {
    Get {
        status_updates: bool,
        session_id: u8,
        encapsulated: Box<CommandClass>,
    },
    Report {
        more_updates_follow: bool,
        session_id: u8,
        status: SupervisionStatus,
        duration: Option<DurationValue>,
    },
}

impl SupervisionCommand {
    pub fn encapsulate(cc: CommandClass, session_id: u8, status_updates: bool) -> CommandClass {
        CommandClass {
            node: cc.node.clone(),
            endpoint: cc.endpoint,
            version: 1,
            command: Command::Supervision(Self::Get {
                status_updates,
                session_id: session_id & SESSION_ID_MASK,
                encapsulated: Box::new(cc),
            }),
        }
    }

    pub fn command_id(&self) -> u8 {
        match self {
            Self::Get { .. } => GET,
            Self::Report { .. } => REPORT,
        }
    }

    pub(crate) fn parse(command: u8, body: &[u8], scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(body);
        match command {
            GET => {
                let flags = reader.u8()?;
                let len = reader.u8()? as usize;
                validate_payload!(len > 0);
                let encapsulated = scope.parse_inner(reader.bytes(len)?, scope.endpoint)?;
                Ok(Self::Get {
                    status_updates: flags & STATUS_UPDATES != 0,
                    session_id: flags & SESSION_ID_MASK,
                    encapsulated: Box::new(encapsulated),
                })
            }
            REPORT => {
                let flags = reader.u8()?;
                let status = SupervisionStatus::parse(reader.u8()?)?;
                Ok(Self::Report {
                    more_updates_follow: flags & MORE_UPDATES_FOLLOW != 0,
                    session_id: flags & SESSION_ID_MASK,
                    status,
                    duration: reader.optional_u8().map(DurationValue::parse),
                })
            }
            other => Err(unknown_command(ids::SUPERVISION, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>, scope: &EncodeScope<'_>) -> Result<()> {
        match self {
            Self::Get {
                status_updates,
                session_id,
                encapsulated,
            } => {
                let inner = CommandClass::serialize(encapsulated, scope.ctx)?;
                let len = u8::try_from(inner.len()).map_err(|_| {
                    CcError::Arithmetic(format!("supervised command of {} bytes", inner.len()))
                })?;
                let mut flags = session_id & SESSION_ID_MASK;
                if *status_updates {
                    flags |= STATUS_UPDATES;
                }
                out.push(flags);
                out.push(len);
                out.extend(inner);
            }
            Self::Report {
                more_updates_follow,
                session_id,
                status,
                duration,
            } => {
                let mut flags = session_id & SESSION_ID_MASK;
                if *more_updates_follow {
                    flags |= MORE_UPDATES_FOLLOW;
                }
                out.push(flags);
                out.push(status.encode());
                out.push(duration.unwrap_or(DurationValue::Set(Default::default())).encode());
            }
        }
        Ok(())
    }
}

impl Encapsulating for SupervisionCommand {
    fn encapsulated(&self) -> Vec<&CommandClass> {
        match self {
            Self::Get { encapsulated, .. } => vec![encapsulated.as_ref()],
            Self::Report { .. } => Vec::new(),
        }
    }

    fn encapsulated_mut(&mut self) -> Encapsulated<'_, CommandClass> {
        match self {
            Self::Get { encapsulated, .. } => Encapsulated::One(encapsulated.as_mut()),
            Self::Report { .. } => Encapsulated::None,
        }
    }

    fn extra_overhead(&self) -> usize {
        match self {
            Self::Get { .. } => 2,
            Self::Report { .. } => 0,
        }
    }
}
