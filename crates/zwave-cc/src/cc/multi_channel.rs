use serde::Serialize;

use crate::cc::unknown_command;
use crate::command_class::{Command, CommandClass, EncodeScope, ParseScope};
use crate::error::{CcError, Result};
use crate::ids;
use crate::payload::{encode_bitmask, parse_bitmask, PayloadReader};
use crate::traits::{Encapsulated, Encapsulating, ValueReport};
use crate::validate_payload;
use crate::values::{ValueEntry, ValueMetadata};

const END_POINT_GET: u8 = 0x07;
const END_POINT_REPORT: u8 = 0x08;
const CAPABILITY_GET: u8 = 0x09;
const CAPABILITY_REPORT: u8 = 0x0A;
const COMMAND_ENCAPSULATION: u8 = 0x0D;

const BIT_ADDRESS: u8 = 0x80;
const ENDPOINT_MASK: u8 = 0x7F;

/// Where an encapsulated command is delivered on the receiving node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointDestination {
    Single(u8),
    /// Several of end points 1..=7 at once.
    Multiple(Vec<u8>),
}

impl EndpointDestination {
    fn parse(byte: u8) -> Self {
        if byte & BIT_ADDRESS != 0 {
            Self::Multiple(
                parse_bitmask(&[byte & ENDPOINT_MASK], 1)
                    .into_iter()
                    .map(|ep| ep as u8)
                    .collect(),
            )
        } else {
            Self::Single(byte & ENDPOINT_MASK)
        }
    }

    fn encode(&self) -> Result<u8> {
        match self {
            Self::Single(ep) if *ep <= ENDPOINT_MASK => Ok(*ep),
            Self::Single(ep) => Err(CcError::Argument(format!("end point {ep} exceeds 127"))),
            Self::Multiple(eps) => {
                if eps.iter().any(|&ep| ep == 0 || ep > 7) {
                    return Err(CcError::Argument(
                        "bit-addressed end points must be within 1..=7".into(),
                    ));
                }
                let wide: Vec<u16> = eps.iter().map(|&ep| ep as u16).collect();
                let mask = encode_bitmask(&wide, 7, 1);
                Ok(BIT_ADDRESS | mask[0])
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MultiChannelCommand {
    EndPointGet,
    EndPointReport {
        dynamic: bool,
        identical: bool,
        individual_count: u8,
        aggregated_count: Option<u8>,
    },
    CapabilityGet {
        endpoint: u8,
    },
    CapabilityReport {
        endpoint: u8,
        dynamic: bool,
        generic_class: u8,
        specific_class: u8,
        supported_ccs: Vec<u8>,
    },
    CommandEncapsulation {
        source_endpoint: u8,
        destination: EndpointDestination,
        encapsulated: Box<CommandClass>,
    },
}

impl MultiChannelCommand {
    /// Wrap a CC addressed to a non-root end point for sending.
    pub fn encapsulate(cc: CommandClass) -> CommandClass {
        CommandClass {
            node: cc.node.clone(),
            endpoint: 0,
            version: cc.version,
            command: Command::MultiChannel(Self::CommandEncapsulation {
                source_endpoint: 0,
                destination: EndpointDestination::Single(cc.endpoint),
                encapsulated: Box::new(cc),
            }),
        }
    }

    pub fn command_id(&self) -> u8 {
        match self {
            Self::EndPointGet => END_POINT_GET,
            Self::EndPointReport { .. } => END_POINT_REPORT,
            Self::CapabilityGet { .. } => CAPABILITY_GET,
            Self::CapabilityReport { .. } => CAPABILITY_REPORT,
            Self::CommandEncapsulation { .. } => COMMAND_ENCAPSULATION,
        }
    }

    pub(crate) fn parse(command: u8, body: &[u8], scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(body);
        match command {
            END_POINT_GET => Ok(Self::EndPointGet),
            END_POINT_REPORT => {
                let flags = reader.u8()?;
                let individual_count = reader.u8()? & ENDPOINT_MASK;
                Ok(Self::EndPointReport {
                    dynamic: flags & 0x80 != 0,
                    identical: flags & 0x40 != 0,
                    individual_count,
                    aggregated_count: reader.optional_u8().map(|count| count & ENDPOINT_MASK),
                })
            }
            CAPABILITY_GET => {
                let endpoint = reader.u8()? & ENDPOINT_MASK;
                validate_payload!(endpoint > 0);
                Ok(Self::CapabilityGet { endpoint })
            }
            CAPABILITY_REPORT => {
                let first = reader.u8()?;
                Ok(Self::CapabilityReport {
                    endpoint: first & ENDPOINT_MASK,
                    dynamic: first & 0x80 != 0,
                    generic_class: reader.u8()?,
                    specific_class: reader.u8()?,
                    supported_ccs: reader.rest().to_vec(),
                })
            }
            COMMAND_ENCAPSULATION => {
                let source_endpoint = reader.u8()? & ENDPOINT_MASK;
                let destination = EndpointDestination::parse(reader.u8()?);
                let inner = reader.rest();
                validate_payload!(!inner.is_empty());
                let encapsulated = scope.parse_inner(inner, source_endpoint)?;
                Ok(Self::CommandEncapsulation {
                    source_endpoint,
                    destination,
                    encapsulated: Box::new(encapsulated),
                })
            }
            other => Err(unknown_command(ids::MULTI_CHANNEL, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>, scope: &EncodeScope<'_>) -> Result<()> {
        match self {
            Self::EndPointGet => {}
            Self::EndPointReport {
                dynamic,
                identical,
                individual_count,
                aggregated_count,
            } => {
                let mut flags = 0u8;
                if *dynamic {
                    flags |= 0x80;
                }
                if *identical {
                    flags |= 0x40;
                }
                out.push(flags);
                out.push(individual_count & ENDPOINT_MASK);
                if let Some(aggregated) = aggregated_count {
                    out.push(aggregated & ENDPOINT_MASK);
                }
            }
            Self::CapabilityGet { endpoint } => out.push(endpoint & ENDPOINT_MASK),
            Self::CapabilityReport {
                endpoint,
                dynamic,
                generic_class,
                specific_class,
                supported_ccs,
            } => {
                out.push((endpoint & ENDPOINT_MASK) | if *dynamic { 0x80 } else { 0 });
                out.push(*generic_class);
                out.push(*specific_class);
                out.extend_from_slice(supported_ccs);
            }
            Self::CommandEncapsulation {
                source_endpoint,
                destination,
                encapsulated,
            } => {
                out.push(source_endpoint & ENDPOINT_MASK);
                out.push(destination.encode()?);
                out.extend(CommandClass::serialize(encapsulated, scope.ctx)?);
            }
        }
        Ok(())
    }
}

impl Encapsulating for MultiChannelCommand {
    fn encapsulated(&self) -> Vec<&CommandClass> {
        match self {
            Self::CommandEncapsulation { encapsulated, .. } => vec![encapsulated.as_ref()],
            _ => Vec::new(),
        }
    }

    fn encapsulated_mut(&mut self) -> Encapsulated<'_, CommandClass> {
        match self {
            Self::CommandEncapsulation { encapsulated, .. } => Encapsulated::One(encapsulated.as_mut()),
            _ => Encapsulated::None,
        }
    }

    fn extra_overhead(&self) -> usize {
        match self {
            Self::CommandEncapsulation { .. } => 2,
            _ => 0,
        }
    }
}

impl ValueReport for MultiChannelCommand {
    fn values(&self) -> Vec<ValueEntry> {
        match self {
            Self::EndPointReport {
                dynamic,
                identical,
                individual_count,
                aggregated_count,
            } => {
                let mut values = vec![
                    ValueEntry::new("individualCount", *individual_count)
                        .with_metadata(ValueMetadata::read_only("Individual end points")),
                    ValueEntry::new("countIsDynamic", *dynamic),
                    ValueEntry::new("identicalCapabilities", *identical),
                ];
                if let Some(aggregated) = aggregated_count {
                    values.push(ValueEntry::new("aggregatedCount", *aggregated));
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
    use crate::cc::basic::BasicCommand;
    use crate::cc::test_support::{ctx, reencode};

    #[test]
    fn encapsulation_sets_inner_endpoint() {
        let cc = reencode(&[0x60, 0x0D, 0x02, 0x00, 0x20, 0x03, 0x63]);
        let inner = cc.innermost();
        assert_eq!(inner.endpoint, 2);
        assert_eq!(
            inner.command,
            Command::Basic(BasicCommand::Report {
                current_value: 99,
                target_value: None,
                duration: None
            })
        );
        assert_eq!(cc.values()[0].property, "currentValue");
    }

    #[test]
    fn bit_addressed_destination() {
        let cc = reencode(&[0x60, 0x0D, 0x00, 0x85, 0x20, 0x02]);
        let Command::MultiChannel(MultiChannelCommand::CommandEncapsulation { destination, .. }) =
            &cc.command
        else {
            panic!("unexpected {:?}", cc.command);
        };
        assert_eq!(*destination, EndpointDestination::Multiple(vec![1, 3]));
    }

    #[test]
    fn encapsulate_wraps_endpoint_command() {
        let cc = CommandClass::new(5u8, BasicCommand::Set { target_value: 0 }).with_endpoint(3);
        let wrapped = MultiChannelCommand::encapsulate(cc);
        assert_eq!(wrapped.endpoint, 0);
        assert_eq!(
            wrapped.serialize(&ctx()).unwrap(),
            vec![0x60, 0x0D, 0x00, 0x03, 0x20, 0x01, 0x00]
        );
    }

    #[test]
    fn empty_encapsulation_is_invalid() {
        let err = CommandClass::parse(&[0x60, 0x0D, 0x01, 0x00], 2, &ctx()).unwrap_err();
        assert!(matches!(err, CcError::InvalidPayload(_)));
    }

    #[test]
    fn end_point_report_v4() {
        let cc = reencode(&[0x60, 0x08, 0x40, 0x02, 0x01]);
        assert_eq!(
            cc.command,
            Command::MultiChannel(MultiChannelCommand::EndPointReport {
                dynamic: false,
                identical: true,
                individual_count: 2,
                aggregated_count: Some(1),
            })
        );
    }
}
