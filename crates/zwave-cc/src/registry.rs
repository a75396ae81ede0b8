//! Static CC id to parser table, built once on first use.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::cc::{
    association::AssociationCommand, basic::BasicCommand, binary_switch::BinarySwitchCommand,
    crc16::Crc16Command, manufacturer_specific::ManufacturerSpecificCommand,
    multi_channel::MultiChannelCommand, multi_command::MultiCommandCommand,
    multilevel_switch::MultilevelSwitchCommand, security::SecurityCommand,
    supervision::SupervisionCommand, thermostat_setpoint::ThermostatSetpointCommand,
    version::VersionCommand, wake_up::WakeUpCommand,
};
use crate::command_class::{Command, ParseScope};
use crate::error::Result;
use crate::ids;

pub(crate) type ParseFn = fn(u8, &[u8], &ParseScope<'_>) -> Result<Command>;

macro_rules! parsers {
    ($($name:ident => $variant:ident($ty:ty)),+ $(,)?) => {
        $(
            fn $name(command: u8, body: &[u8], scope: &ParseScope<'_>) -> Result<Command> {
                <$ty>::parse(command, body, scope).map(Command::$variant)
            }
        )+
    };
}

parsers!(
    basic => Basic(BasicCommand),
    binary_switch => BinarySwitch(BinarySwitchCommand),
    multilevel_switch => MultilevelSwitch(MultilevelSwitchCommand),
    thermostat_setpoint => ThermostatSetpoint(ThermostatSetpointCommand),
    manufacturer_specific => ManufacturerSpecific(ManufacturerSpecificCommand),
    version => Version(VersionCommand),
    wake_up => WakeUp(WakeUpCommand),
    association => Association(AssociationCommand),
    multi_channel => MultiChannel(MultiChannelCommand),
    multi_command => MultiCommand(MultiCommandCommand),
    crc16 => Crc16(Crc16Command),
    supervision => Supervision(SupervisionCommand),
    security => Security(SecurityCommand),
);

static PARSERS: LazyLock<HashMap<u16, ParseFn>> = LazyLock::new(|| {
    HashMap::from([
        (ids::BASIC, basic as ParseFn),
        (ids::BINARY_SWITCH, binary_switch as ParseFn),
        (ids::MULTILEVEL_SWITCH, multilevel_switch as ParseFn),
        (ids::THERMOSTAT_SETPOINT, thermostat_setpoint as ParseFn),
        (ids::MANUFACTURER_SPECIFIC, manufacturer_specific as ParseFn),
        (ids::VERSION, version as ParseFn),
        (ids::WAKE_UP, wake_up as ParseFn),
        (ids::ASSOCIATION, association as ParseFn),
        (ids::MULTI_CHANNEL, multi_channel as ParseFn),
        (ids::MULTI_COMMAND, multi_command as ParseFn),
        (ids::CRC16_ENCAPSULATION, crc16 as ParseFn),
        (ids::SUPERVISION, supervision as ParseFn),
        (ids::SECURITY, security as ParseFn),
    ])
});

pub(crate) fn lookup(cc_id: u16) -> Option<ParseFn> {
    PARSERS.get(&cc_id).copied()
}

/// Queries and the report command a node answers them with.
const REPORT_PAIRS: &[(u16, u8, u8)] = &[
    (ids::BASIC, 0x02, 0x03),
    (ids::BINARY_SWITCH, 0x02, 0x03),
    (ids::MULTILEVEL_SWITCH, 0x02, 0x03),
    (ids::THERMOSTAT_SETPOINT, 0x02, 0x03),
    (ids::THERMOSTAT_SETPOINT, 0x04, 0x05),
    (ids::MANUFACTURER_SPECIFIC, 0x04, 0x05),
    (ids::MANUFACTURER_SPECIFIC, 0x06, 0x07),
    (ids::VERSION, 0x11, 0x12),
    (ids::VERSION, 0x13, 0x14),
    (ids::WAKE_UP, 0x05, 0x06),
    (ids::WAKE_UP, 0x09, 0x0A),
    (ids::ASSOCIATION, 0x02, 0x03),
    (ids::ASSOCIATION, 0x05, 0x06),
    (ids::ASSOCIATION, 0x0B, 0x0C),
    (ids::MULTI_CHANNEL, 0x07, 0x08),
    (ids::MULTI_CHANNEL, 0x09, 0x0A),
    (ids::SUPERVISION, 0x01, 0x02),
    (ids::SECURITY, 0x04, 0x05),
    (ids::SECURITY, 0x40, 0x80),
];

pub(crate) fn expected_report(cc_id: u16, command: u8) -> Option<u8> {
    REPORT_PAIRS
        .iter()
        .find(|(id, query, _)| *id == cc_id && *query == command)
        .map(|(_, _, report)| *report)
}

/// Whether the codec can interpret this CC id.
pub fn is_known(cc_id: u16) -> bool {
    cc_id == ids::NO_OPERATION || PARSERS.contains_key(&cc_id)
}
