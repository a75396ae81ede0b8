use serde::Serialize;
use serde_json::json;

use crate::cc::unknown_command;
use crate::command_class::ParseScope;
use crate::error::Result;
use crate::ids;
use crate::payload::{DurationValue, PayloadReader};
use crate::traits::ValueReport;
use crate::validate_payload;
use crate::values::{ValueEntry, ValueMetadata};

const SET: u8 = 0x01;
const GET: u8 = 0x02;
const REPORT: u8 = 0x03;

/// 0..=99 are levels, 0xFE is unknown, 0xFF is "on" / last level.
fn is_level(value: u8) -> bool {
    value <= 99 || value >= 0xFE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BasicCommand {
    Set {
        target_value: u8,
    },
    Get,
    Report {
        current_value: u8,
        target_value: Option<u8>,
        duration: Option<DurationValue>,
    },
}

impl BasicCommand {
    pub fn command_id(&self) -> u8 {
        match self {
            Self::Set { .. } => SET,
            Self::Get => GET,
            Self::Report { .. } => REPORT,
        }
    }

    pub(crate) fn parse(command: u8, body: &[u8], _scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(body);
        match command {
            SET => {
                let target_value = reader.u8()?;
                validate_payload!(is_level(target_value));
                Ok(Self::Set { target_value })
            }
            GET => Ok(Self::Get),
            REPORT => {
                let current_value = reader.u8()?;
                validate_payload!(is_level(current_value));
                // Target and duration were added in version 2.
                let (target_value, duration) = if reader.remaining() >= 2 {
                    let target = reader.u8()?;
                    validate_payload!(is_level(target));
                    (Some(target), Some(DurationValue::parse(reader.u8()?)))
                } else {
                    (None, None)
                };
                Ok(Self::Report {
                    current_value,
                    target_value,
                    duration,
                })
            }
            other => Err(unknown_command(ids::BASIC, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Set { target_value } => out.push(*target_value),
            Self::Get => {}
            Self::Report {
                current_value,
                target_value,
                duration,
            } => {
                out.push(*current_value);
                if let Some(target) = target_value {
                    out.push(*target);
                    out.push(duration.unwrap_or(DurationValue::Unknown).encode());
                }
            }
        }
        Ok(())
    }
}

impl ValueReport for BasicCommand {
    fn values(&self) -> Vec<ValueEntry> {
        let Self::Report {
            current_value,
            target_value,
            duration,
        } = self
        else {
            return Vec::new();
        };
        let mut values = vec![ValueEntry::new("currentValue", *current_value)
            .with_metadata(ValueMetadata::read_only("Current value"))];
        if let Some(target) = target_value {
            values.push(
                ValueEntry::new("targetValue", *target)
                    .with_metadata(ValueMetadata::level("Target value", 99.0)),
            );
        }
        if let Some(duration) = duration {
            values.push(ValueEntry::new("duration", json!(duration)));
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::cc::test_support::{parse, reencode};
    use crate::command_class::Command;
    use crate::CcError;

    #[test]
    fn set_get_report_v1() {
        assert_eq!(
            reencode(&[0x20, 0x01, 0x63]).command,
            Command::Basic(BasicCommand::Set { target_value: 99 })
        );
        assert_eq!(reencode(&[0x20, 0x02]).command, Command::Basic(BasicCommand::Get));
        assert_eq!(
            reencode(&[0x20, 0x03, 0xFF]).command,
            Command::Basic(BasicCommand::Report {
                current_value: 0xFF,
                target_value: None,
                duration: None
            })
        );
    }

    #[test]
    fn report_v2_carries_target_and_duration() {
        let cc = reencode(&[0x20, 0x03, 0x00, 0x63, 0x05]);
        assert_eq!(
            cc.command,
            Command::Basic(BasicCommand::Report {
                current_value: 0,
                target_value: Some(99),
                duration: Some(DurationValue::Set(Duration::from_secs(5))),
            })
        );
        let values = cc.values();
        assert_eq!(values.len(), 3);
        assert_eq!(values[1].property, "targetValue");
    }

    #[test]
    fn rejects_out_of_range_level() {
        let err = crate::CommandClass::parse(&[0x20, 0x01, 0x80], 2, &crate::StaticContext::new(1))
            .unwrap_err();
        assert!(matches!(err, CcError::InvalidPayload(_)));
    }

    #[test]
    fn rejects_truncated_set() {
        let err =
            crate::CommandClass::parse(&[0x20, 0x01], 2, &crate::StaticContext::new(1)).unwrap_err();
        assert!(matches!(err, CcError::InvalidPayload(_)));
    }

    #[test]
    fn unknown_command_is_not_implemented() {
        let err =
            crate::CommandClass::parse(&[0x20, 0x09], 2, &crate::StaticContext::new(1)).unwrap_err();
        assert_eq!(
            err,
            CcError::NotImplemented {
                cc_id: 0x20,
                command: Some(0x09)
            }
        );
        let _ = parse(&[0x20, 0x02]);
    }
}
