use serde::Serialize;
use serde_json::{json, Value};

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

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    Off,
    On,
    Unknown,
}

impl SwitchState {
    fn parse(byte: u8) -> Result<Self> {
        validate_payload!(byte <= 99 || byte >= 0xFE);
        Ok(match byte {
            0x00 => Self::Off,
            0xFE => Self::Unknown,
            _ => Self::On,
        })
    }

    fn encode(self) -> u8 {
        match self {
            Self::Off => 0x00,
            Self::On => 0xFF,
            Self::Unknown => 0xFE,
        }
    }

    fn as_json(self) -> Value {
        match self {
            Self::Off => Value::Bool(false),
            Self::On => Value::Bool(true),
            Self::Unknown => Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BinarySwitchCommand {
    Set {
        target_value: bool,
        duration: Option<DurationValue>,
    },
    Get,
    Report {
        current_value: SwitchState,
        target_value: Option<SwitchState>,
        duration: Option<DurationValue>,
    },
}

impl BinarySwitchCommand {
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
                let value = reader.u8()?;
                validate_payload!(value == 0x00 || value == 0xFF);
                Ok(Self::Set {
                    target_value: value == 0xFF,
                    duration: reader.optional_u8().map(DurationValue::parse),
                })
            }
            GET => Ok(Self::Get),
            REPORT => {
                let current_value = SwitchState::parse(reader.u8()?)?;
                let (target_value, duration) = if reader.remaining() >= 2 {
                    (
                        Some(SwitchState::parse(reader.u8()?)?),
                        Some(DurationValue::parse(reader.u8()?)),
                    )
                } else {
                    (None, None)
                };
                Ok(Self::Report {
                    current_value,
                    target_value,
                    duration,
                })
            }
            other => Err(unknown_command(ids::BINARY_SWITCH, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Set {
                target_value,
                duration,
            } => {
                out.push(if *target_value { 0xFF } else { 0x00 });
                if let Some(duration) = duration {
                    out.push(duration.encode());
                }
            }
            Self::Get => {}
            Self::Report {
                current_value,
                target_value,
                duration,
            } => {
                out.push(current_value.encode());
                if let Some(target) = target_value {
                    out.push(target.encode());
                    out.push(duration.unwrap_or(DurationValue::Unknown).encode());
                }
            }
        }
        Ok(())
    }
}

impl ValueReport for BinarySwitchCommand {
    fn values(&self) -> Vec<ValueEntry> {
        let Self::Report {
            current_value,
            target_value,
            duration,
        } = self
        else {
            return Vec::new();
        };
        let mut values = vec![ValueEntry::new("currentValue", current_value.as_json())
            .with_metadata(ValueMetadata::read_only("Current value"))];
        if let Some(target) = target_value {
            values.push(ValueEntry::new("targetValue", target.as_json()));
        }
        if let Some(duration) = duration {
            values.push(ValueEntry::new("duration", json!(duration)));
        }
        values
    }
}
