//! Response and callback bodies shared by every transmitting function.

use std::fmt;

use serde::Serialize;
use zwave_cc::PayloadReader;

use crate::error::{MessageError, Result};

/// Outcome reported in a transmit callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmitStatus {
    Ok,
    /// The target did not acknowledge.
    NoAck,
    /// The radio could not transmit at all, typically a jammed channel.
    Fail,
    /// The controller was busy with something else.
    NotIdle,
    NoRoute,
    Unknown(u8),
}

impl TransmitStatus {
    pub fn from_u8(byte: u8) -> Self {
        match byte {
            0x00 => Self::Ok,
            0x01 => Self::NoAck,
            0x02 => Self::Fail,
            0x03 => Self::NotIdle,
            0x04 => Self::NoRoute,
            other => Self::Unknown(other),
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Ok => 0x00,
            Self::NoAck => 0x01,
            Self::Fail => 0x02,
            Self::NotIdle => 0x03,
            Self::NoRoute => 0x04,
            Self::Unknown(byte) => byte,
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }

    /// A hard transmission failure that says nothing about the target node.
    pub fn is_jam(self) -> bool {
        self == Self::Fail
    }
}

impl fmt::Display for TransmitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::NoAck => f.write_str("no ACK"),
            Self::Fail => f.write_str("transmission failure"),
            Self::NotIdle => f.write_str("controller not idle"),
            Self::NoRoute => f.write_str("no route"),
            Self::Unknown(byte) => write!(f, "status 0x{byte:02x}"),
        }
    }
}

/// Callback body: `[callback id, status, transmit report...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransmitReport {
    pub callback_id: u8,
    pub status: TransmitStatus,
    /// Extended transmit report as sent by newer firmware. Kept verbatim.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub report: Vec<u8>,
}

impl TransmitReport {
    pub fn new(callback_id: u8, status: TransmitStatus) -> Self {
        Self {
            callback_id,
            status,
            report: Vec::new(),
        }
    }

    /// Time on air in 10 ms ticks, when the extended report is present.
    pub fn transmit_ticks(&self) -> Option<u16> {
        match self.report.as_slice() {
            [high, low, ..] => Some(u16::from_be_bytes([*high, *low])),
            _ => None,
        }
    }

    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        let mut reader = PayloadReader::new(payload);
        Ok(Self {
            callback_id: reader.u8()?,
            status: TransmitStatus::from_u8(reader.u8()?),
            report: reader.rest().to_vec(),
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.callback_id);
        out.push(self.status.as_u8());
        out.extend_from_slice(&self.report);
    }
}

/// Response body of a transmitting request: did the controller accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransmitResponse {
    pub was_sent: bool,
}

impl TransmitResponse {
    pub(crate) fn parse(payload: &[u8]) -> Result<Self> {
        Ok(Self {
            was_sent: parse_flag(payload)?,
        })
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) {
        out.push(u8::from(self.was_sent));
    }
}

pub(crate) fn parse_flag(payload: &[u8]) -> Result<bool> {
    match payload.first() {
        Some(byte) => Ok(*byte != 0),
        None => Err(MessageError::InvalidPayload("missing status byte".into())),
    }
}
