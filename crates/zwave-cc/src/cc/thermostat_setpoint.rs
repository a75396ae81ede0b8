//! Thermostat Setpoint CC.
//!
//! Version 1 and 2 devices disagree on how the Supported Report bitmask maps
//! to setpoint types. Interpretation A skips the unused types 3..=6, B maps
//! bit `n` to type `n`. A device's interpretation is not discoverable from
//! the report itself, so [`InterpretationProbe`] guesses from which types
//! the device actually answers for.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cc::unknown_command;
use crate::command_class::ParseScope;
use crate::error::Result;
use crate::ids;
use crate::payload::{encode_scaled, parse_bitmask, parse_scaled, PayloadReader, ScaledValue};
use crate::traits::ValueReport;
use crate::validate_payload;
use crate::values::{ValueEntry, ValueMetadata};

const SET: u8 = 0x01;
const GET: u8 = 0x02;
const REPORT: u8 = 0x03;
const SUPPORTED_GET: u8 = 0x04;
const SUPPORTED_REPORT: u8 = 0x05;

/// Bit index to setpoint type under interpretation A.
const INTERPRETATION_A: [u8; 12] = [0, 1, 2, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// Timeouts on A-only types before switching to B.
const A_TIMEOUTS_BEFORE_B: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SetpointInterpretation {
    #[default]
    A,
    B,
}

impl SetpointInterpretation {
    /// Setpoint types a Supported Report bitmask announces.
    pub fn supported_types(self, mask: &[u8]) -> Vec<u8> {
        parse_bitmask(mask, 0)
            .into_iter()
            .filter_map(|bit| match self {
                Self::A => INTERPRETATION_A.get(bit as usize).copied(),
                Self::B => u8::try_from(bit).ok(),
            })
            .filter(|&setpoint_type| setpoint_type != 0)
            .collect()
    }
}

pub fn setpoint_type_name(setpoint_type: u8) -> &'static str {
    match setpoint_type {
        0x01 => "Heating",
        0x02 => "Cooling",
        0x07 => "Furnace",
        0x08 => "Dry Air",
        0x09 => "Moist Air",
        0x0A => "Auto Changeover",
        0x0B => "Energy Save Heating",
        0x0C => "Energy Save Cooling",
        0x0D => "Away Heating",
        0x0E => "Away Cooling",
        0x0F => "Full Power",
        _ => "Unknown",
    }
}

/// Decides a device's bitmask interpretation from Get outcomes.
///
/// A Report for a type only B announces settles on B. A Report for a type
/// only A announces settles on A. Otherwise two timeouts on A-only types
/// switch to B. The first decision sticks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpretationProbe {
    a_only: Vec<u8>,
    b_only: Vec<u8>,
    a_timeouts: u8,
    decided: Option<SetpointInterpretation>,
}

impl InterpretationProbe {
    pub fn new(mask: &[u8]) -> Self {
        let a = SetpointInterpretation::A.supported_types(mask);
        let b = SetpointInterpretation::B.supported_types(mask);
        Self {
            a_only: a.iter().copied().filter(|t| !b.contains(t)).collect(),
            b_only: b.iter().copied().filter(|t| !a.contains(t)).collect(),
            a_timeouts: 0,
            decided: None,
        }
    }

    /// Types worth querying: everything either interpretation announces.
    pub fn candidates(&self, mask: &[u8]) -> Vec<u8> {
        let mut types = SetpointInterpretation::A.supported_types(mask);
        for t in SetpointInterpretation::B.supported_types(mask) {
            if !types.contains(&t) {
                types.push(t);
            }
        }
        types.sort_unstable();
        types
    }

    pub fn on_report(&mut self, setpoint_type: u8) {
        if self.decided.is_some() {
            return;
        }
        if self.b_only.contains(&setpoint_type) {
            self.decided = Some(SetpointInterpretation::B);
        } else if self.a_only.contains(&setpoint_type) {
            self.decided = Some(SetpointInterpretation::A);
        }
    }

    pub fn on_timeout(&mut self, setpoint_type: u8) {
        if self.decided.is_some() || !self.a_only.contains(&setpoint_type) {
            return;
        }
        self.a_timeouts += 1;
        if self.a_timeouts >= A_TIMEOUTS_BEFORE_B {
            self.decided = Some(SetpointInterpretation::B);
        }
    }

    pub fn is_decided(&self) -> bool {
        self.decided.is_some()
    }

    pub fn interpretation(&self) -> SetpointInterpretation {
        self.decided.unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThermostatSetpointCommand {
    Set {
        setpoint_type: u8,
        value: ScaledValue,
    },
    Get {
        setpoint_type: u8,
    },
    Report {
        setpoint_type: u8,
        /// Absent when the device reports an unsupported type.
        value: Option<ScaledValue>,
    },
    SupportedGet,
    SupportedReport {
        bitmask: Vec<u8>,
        interpretation: SetpointInterpretation,
        supported_types: Vec<u8>,
    },
}

impl ThermostatSetpointCommand {
    pub fn command_id(&self) -> u8 {
        match self {
            Self::Set { .. } => SET,
            Self::Get { .. } => GET,
            Self::Report { .. } => REPORT,
            Self::SupportedGet => SUPPORTED_GET,
            Self::SupportedReport { .. } => SUPPORTED_REPORT,
        }
    }

    pub(crate) fn parse(command: u8, body: &[u8], scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(body);
        match command {
            SET => {
                let setpoint_type = reader.u8()? & 0x0F;
                Ok(Self::Set {
                    setpoint_type,
                    value: parse_scaled(&mut reader)?,
                })
            }
            GET => Ok(Self::Get {
                setpoint_type: reader.u8()? & 0x0F,
            }),
            REPORT => {
                let setpoint_type = reader.u8()? & 0x0F;
                let value = if setpoint_type == 0 && reader.is_empty() {
                    None
                } else {
                    Some(parse_scaled(&mut reader)?)
                };
                Ok(Self::Report {
                    setpoint_type,
                    value,
                })
            }
            SUPPORTED_GET => Ok(Self::SupportedGet),
            SUPPORTED_REPORT => {
                validate_payload!(!reader.is_empty());
                let bitmask = reader.rest().to_vec();
                let interpretation = scope.ctx.setpoint_interpretation(scope.node);
                Ok(Self::SupportedReport {
                    supported_types: interpretation.supported_types(&bitmask),
                    interpretation,
                    bitmask,
                })
            }
            other => Err(unknown_command(ids::THERMOSTAT_SETPOINT, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Set {
                setpoint_type,
                value,
            } => {
                out.push(setpoint_type & 0x0F);
                encode_scaled(*value, out)?;
            }
            Self::Get { setpoint_type } => out.push(setpoint_type & 0x0F),
            Self::Report {
                setpoint_type,
                value,
            } => {
                out.push(setpoint_type & 0x0F);
                if let Some(value) = value {
                    encode_scaled(*value, out)?;
                }
            }
            Self::SupportedGet => {}
            Self::SupportedReport { bitmask, .. } => out.extend_from_slice(bitmask),
        }
        Ok(())
    }
}

impl ValueReport for ThermostatSetpointCommand {
    fn values(&self) -> Vec<ValueEntry> {
        match self {
            Self::Report {
                setpoint_type,
                value: Some(value),
            } => {
                let unit = if value.scale == 1 { "°F" } else { "°C" };
                vec![ValueEntry::new("setpoint", value.value)
                    .with_key(setpoint_type_name(*setpoint_type))
                    .with_metadata(
                        ValueMetadata::level(setpoint_type_name(*setpoint_type), 100.0)
                            .with_unit(unit),
                    )]
            }
            Self::SupportedReport {
                supported_types, ..
            } => vec![ValueEntry::new("supportedSetpointTypes", json!(supported_types))],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::test_support::{reencode, NODE};
    use crate::command_class::{Command, CommandClass};
    use crate::context::StaticContext;

    #[test]
    fn set_roundtrip_with_scaled_value() {
        let cc = reencode(&[0x43, 0x01, 0x01, 0x22, 0x00, 0xD7]);
        assert_eq!(
            cc.command,
            Command::ThermostatSetpoint(ThermostatSetpointCommand::Set {
                setpoint_type: 1,
                value: ScaledValue {
                    value: 21.5,
                    scale: 0
                },
            })
        );
    }

    #[test]
    fn report_values_carry_type_key_and_unit() {
        let cc = reencode(&[0x43, 0x03, 0x02, 0x09, 0x48]);
        let values = cc.values();
        assert_eq!(values[0].property_key.as_deref(), Some("Cooling"));
        assert_eq!(values[0].value, json!(72.0));
        assert_eq!(
            values[0].metadata.as_ref().and_then(|m| m.unit.as_deref()),
            Some("°F")
        );
    }

    #[test]
    fn supported_report_uses_context_interpretation() {
        // bits 1, 2 and 3
        let bytes = [0x43, 0x05, 0b0000_1110];
        let a = CommandClass::parse(&bytes, NODE, &StaticContext::new(1)).unwrap();
        let b = CommandClass::parse(
            &bytes,
            NODE,
            &StaticContext::new(1).with_setpoint_interpretation(NODE, SetpointInterpretation::B),
        )
        .unwrap();

        let types = |cc: &CommandClass| match &cc.command {
            Command::ThermostatSetpoint(ThermostatSetpointCommand::SupportedReport {
                supported_types,
                ..
            }) => supported_types.clone(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(types(&a), vec![1, 2, 7]);
        assert_eq!(types(&b), vec![1, 2, 3]);
    }

    #[test]
    fn probe_defaults_to_a() {
        let probe = InterpretationProbe::new(&[0b0000_1110]);
        assert_eq!(probe.interpretation(), SetpointInterpretation::A);
        assert!(!probe.is_decided());
        assert_eq!(probe.candidates(&[0b0000_1110]), vec![1, 2, 3, 7]);
    }

    #[test]
    fn probe_switches_to_b_on_b_only_report() {
        let mut probe = InterpretationProbe::new(&[0b0000_1110]);
        probe.on_report(3);
        assert_eq!(probe.interpretation(), SetpointInterpretation::B);
    }

    #[test]
    fn probe_switches_to_b_after_two_a_only_timeouts() {
        // bits 1..=4: A announces 1,2,7,8 and B announces 1,2,3,4
        let mut probe = InterpretationProbe::new(&[0b0001_1110]);
        probe.on_timeout(7);
        assert!(!probe.is_decided());
        probe.on_timeout(1);
        assert!(!probe.is_decided());
        probe.on_timeout(8);
        assert_eq!(probe.interpretation(), SetpointInterpretation::B);
    }

    #[test]
    fn probe_a_confirmation_sticks() {
        let mut probe = InterpretationProbe::new(&[0b0001_1110]);
        probe.on_report(7);
        probe.on_timeout(8);
        probe.on_report(3);
        assert_eq!(probe.interpretation(), SetpointInterpretation::A);
        assert!(probe.is_decided());
    }
}
