use serde::Serialize;
use serde_json::json;

use crate::cc::unknown_command;
use crate::command_class::ParseScope;
use crate::error::{CcError, Result};
use crate::ids;
use crate::payload::PayloadReader;
use crate::traits::ValueReport;
use crate::values::{ValueEntry, ValueMetadata};

const GET: u8 = 0x11;
const REPORT: u8 = 0x12;
const CC_GET: u8 = 0x13;
const CC_REPORT: u8 = 0x14;

/// `major.minor` as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionNumber {
    pub major: u8,
    pub minor: u8,
}

impl std::fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

fn read_version(reader: &mut PayloadReader<'_>) -> Result<VersionNumber> {
    Ok(VersionNumber {
        major: reader.u8()?,
        minor: reader.u8()?,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VersionCommand {
    Get,
    Report {
        library_type: u8,
        protocol_version: VersionNumber,
        /// Firmware 0 first, then any additional targets (version 3+).
        firmware_versions: Vec<VersionNumber>,
        hardware_version: Option<u8>,
    },
    CommandClassGet {
        requested_cc: u8,
    },
    CommandClassReport {
        requested_cc: u8,
        version: u8,
    },
}

impl VersionCommand {
    pub fn command_id(&self) -> u8 {
        match self {
            Self::Get => GET,
            Self::Report { .. } => REPORT,
            Self::CommandClassGet { .. } => CC_GET,
            Self::CommandClassReport { .. } => CC_REPORT,
        }
    }

    pub(crate) fn parse(command: u8, body: &[u8], _scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(body);
        match command {
            GET => Ok(Self::Get),
            REPORT => {
                let library_type = reader.u8()?;
                let protocol_version = read_version(&mut reader)?;
                let mut firmware_versions = vec![read_version(&mut reader)?];
                let mut hardware_version = None;
                if let Some(hw) = reader.optional_u8() {
                    hardware_version = Some(hw);
                    let targets = reader.u8()?;
                    for _ in 0..targets {
                        firmware_versions.push(read_version(&mut reader)?);
                    }
                }
                Ok(Self::Report {
                    library_type,
                    protocol_version,
                    firmware_versions,
                    hardware_version,
                })
            }
            CC_GET => Ok(Self::CommandClassGet {
                requested_cc: reader.u8()?,
            }),
            CC_REPORT => Ok(Self::CommandClassReport {
                requested_cc: reader.u8()?,
                version: reader.u8()?,
            }),
            other => Err(unknown_command(ids::VERSION, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Get => {}
            Self::Report {
                library_type,
                protocol_version,
                firmware_versions,
                hardware_version,
            } => {
                let Some((first, extra)) = firmware_versions.split_first() else {
                    return Err(CcError::Argument(
                        "a version report needs at least one firmware version".into(),
                    ));
                };
                out.push(*library_type);
                out.extend_from_slice(&[protocol_version.major, protocol_version.minor]);
                out.extend_from_slice(&[first.major, first.minor]);
                match hardware_version {
                    Some(hw) => {
                        out.push(*hw);
                        out.push(extra.len() as u8);
                        for fw in extra {
                            out.extend_from_slice(&[fw.major, fw.minor]);
                        }
                    }
                    None if !extra.is_empty() => {
                        return Err(CcError::Argument(
                            "additional firmware targets need a hardware version".into(),
                        ));
                    }
                    None => {}
                }
            }
            Self::CommandClassGet { requested_cc } => out.push(*requested_cc),
            Self::CommandClassReport {
                requested_cc,
                version,
            } => out.extend_from_slice(&[*requested_cc, *version]),
        }
        Ok(())
    }
}

impl ValueReport for VersionCommand {
    fn values(&self) -> Vec<ValueEntry> {
        match self {
            Self::Report {
                library_type,
                protocol_version,
                firmware_versions,
                hardware_version,
            } => {
                let mut values = vec![
                    ValueEntry::new("libraryType", *library_type),
                    ValueEntry::new("protocolVersion", protocol_version.to_string()),
                    ValueEntry::new(
                        "firmwareVersions",
                        json!(firmware_versions
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()),
                    )
                    .with_metadata(ValueMetadata::read_only("Z-Wave chip firmware versions")),
                ];
                if let Some(hw) = hardware_version {
                    values.push(ValueEntry::new("hardwareVersion", *hw));
                }
                values
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::test_support::reencode;
    use crate::command_class::Command;

    #[test]
    fn report_v1() {
        let cc = reencode(&[0x86, 0x12, 0x03, 0x04, 0x05, 0x01, 0x02]);
        let Command::Version(VersionCommand::Report {
            firmware_versions, ..
        }) = &cc.command
        else {
            panic!("unexpected {:?}", cc.command);
        };
        assert_eq!(firmware_versions[0].to_string(), "1.2");
        assert_eq!(cc.values()[1].value, json!("4.5"));
    }

    #[test]
    fn report_v3_with_extra_targets() {
        let cc = reencode(&[
            0x86, 0x12, 0x03, 0x07, 0x0C, 0x01, 0x02, 0x05, 0x02, 0x02, 0x00, 0x03, 0x01,
        ]);
        let Command::Version(VersionCommand::Report {
            firmware_versions,
            hardware_version,
            ..
        }) = &cc.command
        else {
            panic!("unexpected {:?}", cc.command);
        };
        assert_eq!(firmware_versions.len(), 3);
        assert_eq!(*hardware_version, Some(5));
    }

    #[test]
    fn command_class_report() {
        assert_eq!(
            reencode(&[0x86, 0x14, 0x25, 0x02]).command,
            Command::Version(VersionCommand::CommandClassReport {
                requested_cc: 0x25,
                version: 2
            })
        );
    }
}
