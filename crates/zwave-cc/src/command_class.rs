use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::cc::{
    association::AssociationCommand, basic::BasicCommand, binary_switch::BinarySwitchCommand,
    crc16::Crc16Command, manufacturer_specific::ManufacturerSpecificCommand,
    multi_channel::MultiChannelCommand, multi_command::MultiCommandCommand,
    multilevel_switch::MultilevelSwitchCommand, security::SecurityCommand,
    supervision::SupervisionCommand, thermostat_setpoint::ThermostatSetpointCommand,
    version::VersionCommand, wake_up::WakeUpCommand, RawCommand,
};
use crate::context::{CcContext, Destination, NodeId};
use crate::error::{CcError, Result};
use crate::ids;
use crate::payload::PayloadReader;
use crate::registry;
use crate::traits::{Encapsulated, Encapsulating, Fragmentable, PartialReport, ValueReport};
use crate::values::ValueEntry;

/// Most encapsulation shells a received CC may carry.
pub const MAX_ENCAPSULATION_DEPTH: usize = 4;

/// What to do with a CC id the registry does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownCc {
    /// Fail with `CC_NotImplemented`. Used for traffic from the controller.
    #[default]
    Reject,
    /// Keep the bytes as [`Command::Raw`]. Used for host-originated frames.
    KeepRaw,
}

/// A typed, addressed command class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandClass {
    /// Target when sending, source when received.
    pub node: Destination,
    pub endpoint: u8,
    pub version: u8,
    pub command: Command,
}

/// Every implemented CC family.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "cc", content = "command")]
pub enum Command {
    NoOperation,
    Basic(BasicCommand),
    BinarySwitch(BinarySwitchCommand),
    MultilevelSwitch(MultilevelSwitchCommand),
    ThermostatSetpoint(ThermostatSetpointCommand),
    ManufacturerSpecific(ManufacturerSpecificCommand),
    Version(VersionCommand),
    WakeUp(WakeUpCommand),
    Association(AssociationCommand),
    MultiChannel(MultiChannelCommand),
    MultiCommand(MultiCommandCommand),
    Crc16(Crc16Command),
    Supervision(SupervisionCommand),
    Security(SecurityCommand),
    Raw(RawCommand),
}

macro_rules! impl_from_family {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(
            impl From<$ty> for Command {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )+
    };
}

impl_from_family!(
    Basic(BasicCommand),
    BinarySwitch(BinarySwitchCommand),
    MultilevelSwitch(MultilevelSwitchCommand),
    ThermostatSetpoint(ThermostatSetpointCommand),
    ManufacturerSpecific(ManufacturerSpecificCommand),
    Version(VersionCommand),
    WakeUp(WakeUpCommand),
    Association(AssociationCommand),
    MultiChannel(MultiChannelCommand),
    MultiCommand(MultiCommandCommand),
    Crc16(Crc16Command),
    Supervision(SupervisionCommand),
    Security(SecurityCommand),
    Raw(RawCommand),
);

/// Everything a family parser needs besides its own bytes.
#[derive(Clone, Copy)]
pub(crate) struct ParseScope<'a> {
    pub ctx: &'a dyn CcContext,
    pub node: NodeId,
    pub endpoint: u8,
    pub depth: usize,
    pub unknown: UnknownCc,
}

impl ParseScope<'_> {
    /// Parse a CC wrapped by the one currently being parsed.
    pub fn parse_inner(&self, data: &[u8], endpoint: u8) -> Result<CommandClass> {
        let depth = self.depth + 1;
        if depth > MAX_ENCAPSULATION_DEPTH {
            return Err(CcError::InvalidPayload(format!(
                "encapsulation deeper than {MAX_ENCAPSULATION_DEPTH} levels"
            )));
        }
        CommandClass::parse_scoped(
            data,
            &ParseScope {
                depth,
                endpoint,
                ..*self
            },
        )
    }

    pub fn version(&self, cc_id: u16) -> u8 {
        self.ctx.cc_version(self.node, self.endpoint, cc_id)
    }
}

/// Everything a family encoder needs besides itself.
pub(crate) struct EncodeScope<'a> {
    pub ctx: &'a dyn CcContext,
    pub node: &'a Destination,
}

impl CommandClass {
    pub fn new(node: impl Into<Destination>, command: impl Into<Command>) -> Self {
        Self {
            node: node.into(),
            endpoint: 0,
            version: 1,
            command: command.into(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: u8) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn with_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Parse a CC received from `source`. Unknown CC ids are rejected.
    pub fn parse(data: &[u8], source: NodeId, ctx: &dyn CcContext) -> Result<Self> {
        Self::parse_with(data, source, ctx, UnknownCc::Reject)
    }

    pub fn parse_with(
        data: &[u8],
        node: NodeId,
        ctx: &dyn CcContext,
        unknown: UnknownCc,
    ) -> Result<Self> {
        Self::parse_scoped(
            data,
            &ParseScope {
                ctx,
                node,
                endpoint: 0,
                depth: 0,
                unknown,
            },
        )
    }

    pub(crate) fn parse_scoped(data: &[u8], scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(data);
        let first = reader.u8()?;
        let cc_id = if first >= ids::EXTENDED_ID_START {
            (first as u16) << 8 | reader.u8()? as u16
        } else {
            first as u16
        };

        let command = if cc_id == ids::NO_OPERATION {
            Command::NoOperation
        } else {
            let cc_command = reader.u8()?;
            let body = reader.rest();
            match registry::lookup(cc_id) {
                Some(parse) => match parse(cc_command, body, scope) {
                    Err(CcError::NotImplemented { .. }) if scope.unknown == UnknownCc::KeepRaw => {
                        Command::Raw(RawCommand::new(cc_id, cc_command, body))
                    }
                    other => other?,
                },
                None if scope.unknown == UnknownCc::KeepRaw => {
                    Command::Raw(RawCommand::new(cc_id, cc_command, body))
                }
                None => return Err(CcError::not_implemented(cc_id, Some(cc_command))),
            }
        };

        trace!(node = scope.node, endpoint = scope.endpoint, cc = cc_id, "parsed command class");
        Ok(Self {
            node: Destination::Singlecast(scope.node),
            endpoint: scope.endpoint,
            version: scope.version(cc_id),
            command,
        })
    }

    /// Encode CC id, command and payload, including any wrapped CCs.
    pub fn serialize(&self, ctx: &dyn CcContext) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(8);
        ids::write_id(self.cc_id(), &mut out);
        if let Some(cc_command) = self.cc_command() {
            out.push(cc_command);
        }

        let scope = EncodeScope {
            ctx,
            node: &self.node,
        };
        match &self.command {
            Command::NoOperation => {}
            Command::Basic(c) => c.encode(&mut out)?,
            Command::BinarySwitch(c) => c.encode(&mut out)?,
            Command::MultilevelSwitch(c) => c.encode(&mut out)?,
            Command::ThermostatSetpoint(c) => c.encode(&mut out)?,
            Command::ManufacturerSpecific(c) => c.encode(&mut out)?,
            Command::Version(c) => c.encode(&mut out)?,
            Command::WakeUp(c) => c.encode(&mut out)?,
            Command::Association(c) => c.encode(&mut out)?,
            Command::MultiChannel(c) => c.encode(&mut out, &scope)?,
            Command::MultiCommand(c) => c.encode(&mut out, &scope)?,
            Command::Crc16(c) => c.encode(&mut out, &scope)?,
            Command::Supervision(c) => c.encode(&mut out, &scope)?,
            Command::Security(c) => c.encode(&mut out, &scope)?,
            Command::Raw(c) => out.extend_from_slice(&c.payload),
        }
        Ok(out)
    }

    pub fn cc_id(&self) -> u16 {
        match &self.command {
            Command::NoOperation => ids::NO_OPERATION,
            Command::Basic(_) => ids::BASIC,
            Command::BinarySwitch(_) => ids::BINARY_SWITCH,
            Command::MultilevelSwitch(_) => ids::MULTILEVEL_SWITCH,
            Command::ThermostatSetpoint(_) => ids::THERMOSTAT_SETPOINT,
            Command::ManufacturerSpecific(_) => ids::MANUFACTURER_SPECIFIC,
            Command::Version(_) => ids::VERSION,
            Command::WakeUp(_) => ids::WAKE_UP,
            Command::Association(_) => ids::ASSOCIATION,
            Command::MultiChannel(_) => ids::MULTI_CHANNEL,
            Command::MultiCommand(_) => ids::MULTI_COMMAND,
            Command::Crc16(_) => ids::CRC16_ENCAPSULATION,
            Command::Supervision(_) => ids::SUPERVISION,
            Command::Security(_) => ids::SECURITY,
            Command::Raw(c) => c.cc_id,
        }
    }

    /// The command byte. No Operation has none.
    pub fn cc_command(&self) -> Option<u8> {
        Some(match &self.command {
            Command::NoOperation => return None,
            Command::Basic(c) => c.command_id(),
            Command::BinarySwitch(c) => c.command_id(),
            Command::MultilevelSwitch(c) => c.command_id(),
            Command::ThermostatSetpoint(c) => c.command_id(),
            Command::ManufacturerSpecific(c) => c.command_id(),
            Command::Version(c) => c.command_id(),
            Command::WakeUp(c) => c.command_id(),
            Command::Association(c) => c.command_id(),
            Command::MultiChannel(c) => c.command_id(),
            Command::MultiCommand(c) => c.command_id(),
            Command::Crc16(c) => c.command_id(),
            Command::Supervision(c) => c.command_id(),
            Command::Security(c) => c.command_id(),
            Command::Raw(c) => c.command,
        })
    }

    /// Bytes taken by the CC id and command fields.
    pub fn header_len(&self) -> usize {
        ids::id_len(self.cc_id()) + usize::from(self.cc_command().is_some())
    }

    /// Source or target node for singlecast CCs.
    pub fn node_id(&self) -> Option<NodeId> {
        self.node.node_id()
    }

    pub fn as_encapsulating(&self) -> Option<&dyn Encapsulating> {
        match &self.command {
            Command::MultiChannel(c) => Some(c),
            Command::MultiCommand(c) => Some(c),
            Command::Crc16(c) => Some(c),
            Command::Supervision(c) => Some(c),
            Command::Security(c) => Some(c),
            _ => None,
        }
    }

    pub fn encapsulated_mut(&mut self) -> Encapsulated<'_, CommandClass> {
        match &mut self.command {
            Command::MultiChannel(c) => c.encapsulated_mut(),
            Command::MultiCommand(c) => c.encapsulated_mut(),
            Command::Crc16(c) => c.encapsulated_mut(),
            Command::Supervision(c) => c.encapsulated_mut(),
            Command::Security(c) => c.encapsulated_mut(),
            _ => Encapsulated::None,
        }
    }

    /// Follow single-child encapsulation down to the CC that carries data.
    /// Multi Command bundles stop the descent.
    pub fn innermost(&self) -> &CommandClass {
        self.layers().last().unwrap_or(self)
    }

    /// This CC and every single-child shell below it, outermost first.
    pub fn layers(&self) -> impl Iterator<Item = &CommandClass> {
        std::iter::successors(Some(self), |cc| next_layer(*cc))
    }

    /// The (CC id, command) a node answers this CC with, if it is a query.
    /// The outermost query wins, so a supervised command expects a
    /// Supervision Report.
    pub fn expected_report(&self) -> Option<(u16, u8)> {
        self.layers().find_map(|layer| {
            let report = registry::expected_report(layer.cc_id(), layer.cc_command()?)?;
            Some((layer.cc_id(), report))
        })
    }

    /// Whether `candidate`, received from the target, answers this CC.
    pub fn is_expected_report(&self, candidate: &CommandClass) -> bool {
        let Some((cc_id, report)) = self.expected_report() else {
            return false;
        };
        if candidate.node_id().is_none() || candidate.node_id() != self.node_id() {
            return false;
        }
        let session = supervision_session(self);
        candidate.layers().any(|layer| {
            layer.cc_id() == cc_id
                && layer.cc_command() == Some(report)
                && (session.is_none() || supervision_session(layer) == session)
        })
    }

    /// Whether this CC (not its wrappers) is one part of a split report.
    pub fn expect_more_messages(&self) -> bool {
        match &self.command {
            Command::Association(c) => c.expect_more_messages(),
            _ => false,
        }
    }

    /// Fold earlier parts into this final part.
    pub fn merge_partial(&mut self, prior: Vec<CommandClass>) -> Result<()> {
        let cc_id = self.cc_id();
        let cc_command = self.cc_command();
        match &mut self.command {
            Command::Association(report) => {
                let parts = prior
                    .into_iter()
                    .map(|part| match part.command {
                        Command::Association(c) => Ok(c),
                        other => Err(CcError::InvalidPayload(format!(
                            "cannot merge {other:?} into an Association report"
                        ))),
                    })
                    .collect::<Result<Vec<_>>>()?;
                report.merge_partial(parts)
            }
            _ => Err(CcError::not_implemented(cc_id, cc_command)),
        }
    }

    /// Split into a partial-report sequence if this command supports it.
    /// Commands that cannot be split come back unchanged.
    pub fn fragment(&self, max_payload: usize) -> Result<Vec<CommandClass>> {
        match &self.command {
            Command::Association(c) => Ok(c
                .fragment(max_payload)?
                .into_iter()
                .map(|part| CommandClass {
                    command: Command::Association(part),
                    ..self.clone()
                })
                .collect()),
            _ => Ok(vec![self.clone()]),
        }
    }

    /// Node values carried by this CC or the data CC it wraps.
    pub fn values(&self) -> Vec<ValueEntry> {
        match &self.innermost().command {
            Command::Basic(c) => c.values(),
            Command::BinarySwitch(c) => c.values(),
            Command::MultilevelSwitch(c) => c.values(),
            Command::ThermostatSetpoint(c) => c.values(),
            Command::ManufacturerSpecific(c) => c.values(),
            Command::Version(c) => c.values(),
            Command::WakeUp(c) => c.values(),
            Command::Association(c) => c.values(),
            Command::MultiChannel(c) => c.values(),
            _ => Vec::new(),
        }
    }
}

fn next_layer(cc: &CommandClass) -> Option<&CommandClass> {
    if matches!(cc.command, Command::MultiCommand(_)) {
        return None;
    }
    match cc.as_encapsulating()?.encapsulated().as_slice() {
        [only] => Some(*only),
        _ => None,
    }
}

fn supervision_session(cc: &CommandClass) -> Option<u8> {
    cc.layers().find_map(|layer| match &layer.command {
        Command::Supervision(
            SupervisionCommand::Get { session_id, .. } | SupervisionCommand::Report { session_id, .. },
        ) => Some(*session_id),
        _ => None,
    })
}

impl fmt::Display for CommandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = ids::name(self.cc_id()).unwrap_or("Unknown");
        write!(f, "{name} (0x{:02x})", self.cc_id())?;
        if let Some(cc_command) = self.cc_command() {
            write!(f, " cmd 0x{cc_command:02x}")?;
        }
        write!(f, " {}", self.node)?;
        if self.endpoint != 0 {
            write!(f, " ep {}", self.endpoint)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::multi_channel::MultiChannelCommand;
    use crate::cc::supervision::SupervisionStatus;
    use crate::cc::test_support::{ctx, NODE};

    fn report_from(node: NodeId, bytes: &[u8]) -> CommandClass {
        CommandClass::parse(bytes, node, &ctx()).unwrap()
    }

    #[test]
    fn get_expects_its_report() {
        let get = CommandClass::new(NODE, BasicCommand::Get);
        assert_eq!(get.expected_report(), Some((ids::BASIC, 0x03)));
        assert!(get.is_expected_report(&report_from(NODE, &[0x20, 0x03, 0x10])));
        assert!(!get.is_expected_report(&report_from(NODE + 1, &[0x20, 0x03, 0x10])));
        assert!(!get.is_expected_report(&report_from(NODE, &[0x25, 0x03, 0x00])));
    }

    #[test]
    fn set_expects_nothing() {
        let set = CommandClass::new(NODE, BasicCommand::Set { target_value: 5 });
        assert_eq!(set.expected_report(), None);
    }

    #[test]
    fn endpoint_reports_arrive_wrapped() {
        let get = MultiChannelCommand::encapsulate(
            CommandClass::new(NODE, BasicCommand::Get).with_endpoint(2),
        );
        assert_eq!(get.expected_report(), Some((ids::BASIC, 0x03)));
        let wrapped = report_from(NODE, &[0x60, 0x0D, 0x02, 0x00, 0x20, 0x03, 0x63]);
        assert!(get.is_expected_report(&wrapped));
    }

    #[test]
    fn supervised_set_expects_matching_session() {
        let set = SupervisionCommand::encapsulate(
            CommandClass::new(NODE, BasicCommand::Set { target_value: 5 }),
            9,
            false,
        );
        assert_eq!(set.expected_report(), Some((ids::SUPERVISION, 0x02)));

        let report = |session_id| {
            CommandClass::new(
                NODE,
                SupervisionCommand::Report {
                    more_updates_follow: false,
                    session_id,
                    status: SupervisionStatus::Success,
                    duration: None,
                },
            )
        };
        assert!(set.is_expected_report(&report(9)));
        assert!(!set.is_expected_report(&report(10)));
    }

    #[test]
    fn display_names_the_cc() {
        let cc = CommandClass::new(NODE, BasicCommand::Get).with_endpoint(1);
        assert_eq!(cc.to_string(), format!("Basic (0x20) cmd 0x02 node {NODE} ep 1"));
    }
}
