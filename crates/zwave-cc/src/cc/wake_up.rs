use serde::Serialize;

use crate::cc::unknown_command;
use crate::command_class::ParseScope;
use crate::context::NodeId;
use crate::error::{CcError, Result};
use crate::ids;
use crate::payload::PayloadReader;
use crate::traits::ValueReport;
use crate::values::{ValueEntry, ValueMetadata};

const INTERVAL_SET: u8 = 0x04;
const INTERVAL_GET: u8 = 0x05;
const INTERVAL_REPORT: u8 = 0x06;
const NOTIFICATION: u8 = 0x07;
const NO_MORE_INFORMATION: u8 = 0x08;
const INTERVAL_CAPABILITIES_GET: u8 = 0x09;
const INTERVAL_CAPABILITIES_REPORT: u8 = 0x0A;

const MAX_INTERVAL: u32 = 0x00FF_FFFF;

fn push_u24(value: u32, out: &mut Vec<u8>) -> Result<()> {
    if value > MAX_INTERVAL {
        return Err(CcError::Arithmetic(format!(
            "wake up interval {value} exceeds 24 bits"
        )));
    }
    out.extend_from_slice(&value.to_be_bytes()[1..]);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WakeUpCommand {
    IntervalSet {
        interval_secs: u32,
        controller_node: NodeId,
    },
    IntervalGet,
    IntervalReport {
        interval_secs: u32,
        controller_node: NodeId,
    },
    Notification,
    NoMoreInformation,
    IntervalCapabilitiesGet,
    IntervalCapabilitiesReport {
        min_secs: u32,
        max_secs: u32,
        default_secs: u32,
        step_secs: u32,
    },
}

impl WakeUpCommand {
    pub fn command_id(&self) -> u8 {
        match self {
            Self::IntervalSet { .. } => INTERVAL_SET,
            Self::IntervalGet => INTERVAL_GET,
            Self::IntervalReport { .. } => INTERVAL_REPORT,
            Self::Notification => NOTIFICATION,
            Self::NoMoreInformation => NO_MORE_INFORMATION,
            Self::IntervalCapabilitiesGet => INTERVAL_CAPABILITIES_GET,
            Self::IntervalCapabilitiesReport { .. } => INTERVAL_CAPABILITIES_REPORT,
        }
    }

    pub(crate) fn parse(command: u8, body: &[u8], _scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(body);
        match command {
            INTERVAL_SET => Ok(Self::IntervalSet {
                interval_secs: reader.u24()?,
                controller_node: reader.u8()?,
            }),
            INTERVAL_GET => Ok(Self::IntervalGet),
            INTERVAL_REPORT => Ok(Self::IntervalReport {
                interval_secs: reader.u24()?,
                controller_node: reader.u8()?,
            }),
            NOTIFICATION => Ok(Self::Notification),
            NO_MORE_INFORMATION => Ok(Self::NoMoreInformation),
            INTERVAL_CAPABILITIES_GET => Ok(Self::IntervalCapabilitiesGet),
            INTERVAL_CAPABILITIES_REPORT => Ok(Self::IntervalCapabilitiesReport {
                min_secs: reader.u24()?,
                max_secs: reader.u24()?,
                default_secs: reader.u24()?,
                step_secs: reader.u24()?,
            }),
            other => Err(unknown_command(ids::WAKE_UP, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::IntervalSet {
                interval_secs,
                controller_node,
            }
            | Self::IntervalReport {
                interval_secs,
                controller_node,
            } => {
                push_u24(*interval_secs, out)?;
                out.push(*controller_node);
            }
            Self::IntervalCapabilitiesReport {
                min_secs,
                max_secs,
                default_secs,
                step_secs,
            } => {
                for value in [min_secs, max_secs, default_secs, step_secs] {
                    push_u24(*value, out)?;
                }
            }
            Self::IntervalGet
            | Self::Notification
            | Self::NoMoreInformation
            | Self::IntervalCapabilitiesGet => {}
        }
        Ok(())
    }
}

impl ValueReport for WakeUpCommand {
    fn values(&self) -> Vec<ValueEntry> {
        match self {
            Self::IntervalReport {
                interval_secs,
                controller_node,
            } => vec![
                ValueEntry::new("wakeUpInterval", *interval_secs).with_metadata(
                    ValueMetadata::level("Wake Up interval", MAX_INTERVAL as f64).with_unit("seconds"),
                ),
                ValueEntry::new("controllerNodeId", *controller_node)
                    .with_metadata(ValueMetadata::read_only("Node ID of the controller")),
            ],
            Self::IntervalCapabilitiesReport {
                min_secs, max_secs, ..
            } => vec![
                ValueEntry::new("minWakeUpInterval", *min_secs),
                ValueEntry::new("maxWakeUpInterval", *max_secs),
            ],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::test_support::reencode;
    use crate::command_class::{Command, CommandClass};
    use crate::context::StaticContext;

    #[test]
    fn interval_report_roundtrip() {
        let cc = reencode(&[0x84, 0x06, 0x00, 0x0E, 0x10, 0x01]);
        assert_eq!(
            cc.command,
            Command::WakeUp(WakeUpCommand::IntervalReport {
                interval_secs: 3600,
                controller_node: 1
            })
        );
    }

    #[test]
    fn notification_and_no_more_information() {
        assert_eq!(
            reencode(&[0x84, 0x07]).command,
            Command::WakeUp(WakeUpCommand::Notification)
        );
        assert_eq!(
            reencode(&[0x84, 0x08]).command,
            Command::WakeUp(WakeUpCommand::NoMoreInformation)
        );
    }

    #[test]
    fn interval_over_24_bits_is_arithmetic() {
        let cc = CommandClass::new(
            5u8,
            WakeUpCommand::IntervalSet {
                interval_secs: 0x0100_0000,
                controller_node: 1,
            },
        );
        assert!(matches!(
            cc.serialize(&StaticContext::new(1)),
            Err(CcError::Arithmetic(_))
        ));
    }
}
