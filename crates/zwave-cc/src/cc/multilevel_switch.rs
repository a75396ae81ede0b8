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
const START_LEVEL_CHANGE: u8 = 0x04;
const STOP_LEVEL_CHANGE: u8 = 0x05;

const DIRECTION_DOWN: u8 = 0x40;
const IGNORE_START_LEVEL: u8 = 0x20;

fn is_level(value: u8) -> bool {
    value <= 99 || value >= 0xFE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MultilevelSwitchCommand {
    Set {
        target_value: u8,
        duration: Option<DurationValue>,
    },
    Get,
    Report {
        current_value: u8,
        target_value: Option<u8>,
        duration: Option<DurationValue>,
    },
    StartLevelChange {
        direction: LevelDirection,
        ignore_start_level: bool,
        start_level: u8,
        duration: Option<DurationValue>,
    },
    StopLevelChange,
}

impl MultilevelSwitchCommand {
    pub fn command_id(&self) -> u8 {
        match self {
            Self::Set { .. } => SET,
            Self::Get => GET,
            Self::Report { .. } => REPORT,
            Self::StartLevelChange { .. } => START_LEVEL_CHANGE,
            Self::StopLevelChange => STOP_LEVEL_CHANGE,
        }
    }

    pub(crate) fn parse(command: u8, body: &[u8], _scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(body);
        match command {
            SET => {
                let target_value = reader.u8()?;
                validate_payload!(is_level(target_value));
                Ok(Self::Set {
                    target_value,
                    duration: reader.optional_u8().map(DurationValue::parse),
                })
            }
            GET => Ok(Self::Get),
            REPORT => {
                let current_value = reader.u8()?;
                validate_payload!(is_level(current_value));
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
            START_LEVEL_CHANGE => {
                let flags = reader.u8()?;
                let start_level = reader.u8()?;
                Ok(Self::StartLevelChange {
                    direction: if flags & DIRECTION_DOWN != 0 {
                        LevelDirection::Down
                    } else {
                        LevelDirection::Up
                    },
                    ignore_start_level: flags & IGNORE_START_LEVEL != 0,
                    start_level,
                    duration: reader.optional_u8().map(DurationValue::parse),
                })
            }
            STOP_LEVEL_CHANGE => Ok(Self::StopLevelChange),
            other => Err(unknown_command(ids::MULTILEVEL_SWITCH, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Set {
                target_value,
                duration,
            } => {
                out.push(*target_value);
                if let Some(duration) = duration {
                    out.push(duration.encode());
                }
            }
            Self::Get | Self::StopLevelChange => {}
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
            Self::StartLevelChange {
                direction,
                ignore_start_level,
                start_level,
                duration,
            } => {
                let mut flags = 0u8;
                if *direction == LevelDirection::Down {
                    flags |= DIRECTION_DOWN;
                }
                if *ignore_start_level {
                    flags |= IGNORE_START_LEVEL;
                }
                out.push(flags);
                out.push(*start_level);
                if let Some(duration) = duration {
                    out.push(duration.encode());
                }
            }
        }
        Ok(())
    }
}

impl ValueReport for MultilevelSwitchCommand {
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
