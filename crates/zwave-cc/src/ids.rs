//! Command class identifiers.
//!
//! Ids below `0xF1` are one byte on the wire. `0xF1..=0xFF` introduce a
//! two-byte extended id.

pub const NO_OPERATION: u16 = 0x00;
pub const BASIC: u16 = 0x20;
pub const BINARY_SWITCH: u16 = 0x25;
pub const MULTILEVEL_SWITCH: u16 = 0x26;
pub const THERMOSTAT_SETPOINT: u16 = 0x43;
pub const CRC16_ENCAPSULATION: u16 = 0x56;
pub const MULTI_CHANNEL: u16 = 0x60;
pub const SUPERVISION: u16 = 0x6C;
pub const MANUFACTURER_SPECIFIC: u16 = 0x72;
pub const WAKE_UP: u16 = 0x84;
pub const ASSOCIATION: u16 = 0x85;
pub const VERSION: u16 = 0x86;
pub const MULTI_COMMAND: u16 = 0x8F;
pub const SECURITY: u16 = 0x98;

/// First byte value that starts a two-byte extended CC id.
pub const EXTENDED_ID_START: u8 = 0xF1;

/// Whether this id occupies two bytes on the wire.
pub fn is_extended(cc_id: u16) -> bool {
    cc_id > 0xFF
}

/// Wire length of the CC id field.
pub fn id_len(cc_id: u16) -> usize {
    if is_extended(cc_id) {
        2
    } else {
        1
    }
}

pub(crate) fn write_id(cc_id: u16, out: &mut Vec<u8>) {
    if is_extended(cc_id) {
        out.extend_from_slice(&cc_id.to_be_bytes());
    } else {
        out.push(cc_id as u8);
    }
}

/// Human-readable name, for logs and the CLI.
pub fn name(cc_id: u16) -> Option<&'static str> {
    Some(match cc_id {
        NO_OPERATION => "No Operation",
        BASIC => "Basic",
        BINARY_SWITCH => "Binary Switch",
        MULTILEVEL_SWITCH => "Multilevel Switch",
        THERMOSTAT_SETPOINT => "Thermostat Setpoint",
        CRC16_ENCAPSULATION => "CRC-16 Encapsulation",
        MULTI_CHANNEL => "Multi Channel",
        SUPERVISION => "Supervision",
        MANUFACTURER_SPECIFIC => "Manufacturer Specific",
        WAKE_UP => "Wake Up",
        ASSOCIATION => "Association",
        VERSION => "Version",
        MULTI_COMMAND => "Multi Command",
        SECURITY => "Security",
        _ => return None,
    })
}
