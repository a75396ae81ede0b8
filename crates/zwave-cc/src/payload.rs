//! Payload reading and the primitive field encodings shared by command classes.
//!
//! Every CC decode path reads through [`PayloadReader`] or guards with
//! [`validate_payload!`](crate::validate_payload); both fail with
//! [`CcError::InvalidPayload`] instead of indexing out of bounds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CcError, Result};

/// Fail with `InvalidPayload` unless every condition holds.
#[macro_export]
macro_rules! validate_payload {
    ($($cond:expr),+ $(,)?) => {
        $(
            if !($cond) {
                return Err($crate::CcError::InvalidPayload(format!(
                    "assertion failed: {}",
                    stringify!($cond)
                )));
            }
        )+
    };
}

/// Bounds-checked cursor over a CC payload.
#[derive(Debug, Clone)]
pub struct PayloadReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn peek_u8(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(CcError::InvalidPayload(format!(
                "need {n} bytes at offset {}, only {} left",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u24(&mut self) -> Result<u32> {
        let [a, b, c] = self.array()?;
        Ok(u32::from_be_bytes([0, a, b, c]))
    }

    /// Read a byte if one is left. Used for fields added in later CC versions.
    pub fn optional_u8(&mut self) -> Option<u8> {
        let value = self.peek_u8()?;
        self.pos += 1;
        Some(value)
    }

    /// Everything not read yet.
    pub fn rest(&mut self) -> &'a [u8] {
        let out = &self.buf[self.pos..];
        self.pos = self.buf.len();
        out
    }
}

/// Transition duration as carried in switch reports and sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationValue {
    /// An explicit duration, 0 meaning instantly.
    Set(Duration),
    /// Reported by the device when it cannot tell.
    Unknown,
    /// Use the device's factory default.
    Default,
}

impl DurationValue {
    pub fn parse(byte: u8) -> Self {
        match byte {
            0x00..=0x7F => Self::Set(Duration::from_secs(byte as u64)),
            0x80..=0xFD => Self::Set(Duration::from_secs((byte as u64 - 0x7F) * 60)),
            0xFE => Self::Unknown,
            0xFF => Self::Default,
        }
    }

    /// Encode as a duration byte. Durations beyond 126 minutes saturate.
    pub fn encode(self) -> u8 {
        match self {
            Self::Set(duration) => {
                let secs = duration.as_secs();
                if secs <= 0x7F {
                    secs as u8
                } else {
                    let minutes = (secs / 60).clamp(1, 0x7E);
                    (minutes + 0x7F) as u8
                }
            }
            Self::Unknown => 0xFE,
            Self::Default => 0xFF,
        }
    }
}

/// A signed decimal with its scale, as used by setpoints, meters and sensors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaledValue {
    pub value: f64,
    pub scale: u8,
}

const MAX_PRECISION: u32 = 7;

/// Parse the precision/scale/size header byte and the value that follows.
pub fn parse_scaled(reader: &mut PayloadReader<'_>) -> Result<ScaledValue> {
    let header = reader.u8()?;
    let precision = (header >> 5) as i32;
    let scale = (header >> 3) & 0x03;
    let size = (header & 0x07) as usize;
    validate_payload!(matches!(size, 1 | 2 | 4));

    let raw = reader.bytes(size)?;
    let int = match size {
        1 => raw[0] as i8 as i64,
        2 => i16::from_be_bytes([raw[0], raw[1]]) as i64,
        _ => i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64,
    };
    Ok(ScaledValue {
        value: int as f64 / 10f64.powi(precision),
        scale,
    })
}

/// Encode a scaled value using the smallest size and precision that
/// represent it exactly.
pub fn encode_scaled(value: ScaledValue, out: &mut Vec<u8>) -> Result<()> {
    if !value.value.is_finite() {
        return Err(CcError::Arithmetic(format!(
            "{} cannot be encoded",
            value.value
        )));
    }
    if value.scale > 0x03 {
        return Err(CcError::Argument(format!("scale {} exceeds 2 bits", value.scale)));
    }

    let mut precision = 0u32;
    let mut scaled = value.value;
    while precision < MAX_PRECISION && (scaled - scaled.round()).abs() > 1e-9 {
        precision += 1;
        scaled = value.value * 10f64.powi(precision as i32);
    }
    let int = scaled.round();
    if int < i32::MIN as f64 || int > i32::MAX as f64 {
        return Err(CcError::Arithmetic(format!(
            "{} does not fit in 4 bytes at precision {precision}",
            value.value
        )));
    }
    let int = int as i32;

    let (size, bytes): (u8, Vec<u8>) = if let Ok(v) = i8::try_from(int) {
        (1, v.to_be_bytes().to_vec())
    } else if let Ok(v) = i16::try_from(int) {
        (2, v.to_be_bytes().to_vec())
    } else {
        (4, int.to_be_bytes().to_vec())
    };

    out.push(((precision as u8) << 5) | (value.scale << 3) | size);
    out.extend_from_slice(&bytes);
    Ok(())
}

/// Values whose bit is set, bit 0 of byte 0 mapping to `start_value`.
pub fn parse_bitmask(mask: &[u8], start_value: u16) -> Vec<u16> {
    let mut out = Vec::new();
    for (index, byte) in mask.iter().enumerate() {
        for bit in 0..8 {
            if byte & (1 << bit) != 0 {
                out.push(start_value + (index * 8 + bit) as u16);
            }
        }
    }
    out
}

/// Inverse of [`parse_bitmask`], sized to cover `max_value`.
pub fn encode_bitmask(values: &[u16], max_value: u16, start_value: u16) -> Vec<u8> {
    let len = ((max_value.saturating_sub(start_value)) / 8 + 1) as usize;
    let mut out = vec![0u8; len];
    for &value in values {
        if value < start_value || value > max_value {
            continue;
        }
        let offset = (value - start_value) as usize;
        out[offset / 8] |= 1 << (offset % 8);
    }
    out
}

/// CRC-16/AUG-CCITT (poly 0x1021, init 0x1D0F) used by the CRC-16 encapsulation CC.
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x1D0F;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_rejects_out_of_bounds_reads() {
        let mut reader = PayloadReader::new(&[0x01, 0x02, 0x03]);
        assert_eq!(reader.u16().unwrap(), 0x0102);
        assert!(matches!(reader.u16(), Err(CcError::InvalidPayload(_))));
        assert_eq!(reader.u8().unwrap(), 0x03);
        assert!(reader.is_empty());
        assert_eq!(reader.optional_u8(), None);
    }

    #[test]
    fn reader_u24_and_rest() {
        let mut reader = PayloadReader::new(&[0x00, 0x0e, 0x10, 0x01, 0xAA]);
        assert_eq!(reader.u24().unwrap(), 3600);
        assert_eq!(reader.rest(), &[0x01, 0xAA]);
        assert_eq!(reader.remaining(), 0);
    }

    fn check(len: usize) -> Result<()> {
        validate_payload!(len >= 2, len <= 4);
        Ok(())
    }

    #[test]
    fn validate_payload_macro_checks_every_condition() {
        assert!(check(3).is_ok());
        assert!(matches!(check(1), Err(CcError::InvalidPayload(msg)) if msg.contains("len >= 2")));
        assert!(matches!(check(5), Err(CcError::InvalidPayload(msg)) if msg.contains("len <= 4")));
    }

    #[test]
    fn duration_encoding() {
        assert_eq!(DurationValue::parse(0x00), DurationValue::Set(Duration::ZERO));
        assert_eq!(
            DurationValue::parse(0x81),
            DurationValue::Set(Duration::from_secs(120))
        );
        assert_eq!(DurationValue::parse(0xFE), DurationValue::Unknown);
        assert_eq!(DurationValue::Set(Duration::from_secs(180)).encode(), 0x82);
        assert_eq!(DurationValue::Set(Duration::from_secs(10)).encode(), 0x0A);
        assert_eq!(DurationValue::Default.encode(), 0xFF);
    }

    #[test]
    fn scaled_value_picks_smallest_representation() {
        let mut out = Vec::new();
        encode_scaled(ScaledValue { value: 21.5, scale: 0 }, &mut out).unwrap();
        // precision 1, scale 0, size 1, value 215 does not fit i8 -> size 2
        assert_eq!(out, vec![0x22, 0x00, 0xD7]);

        let mut reader = PayloadReader::new(&out);
        assert_eq!(
            parse_scaled(&mut reader).unwrap(),
            ScaledValue { value: 21.5, scale: 0 }
        );
    }

    #[test]
    fn scaled_value_negative_and_scale() {
        let mut out = Vec::new();
        encode_scaled(ScaledValue { value: -5.0, scale: 1 }, &mut out).unwrap();
        assert_eq!(out, vec![0x09, 0xFB]);
    }

    #[test]
    fn scaled_value_overflow_is_arithmetic() {
        let mut out = Vec::new();
        let err = encode_scaled(ScaledValue { value: 1e12, scale: 0 }, &mut out).unwrap_err();
        assert!(matches!(err, CcError::Arithmetic(_)));
        assert!(matches!(
            encode_scaled(ScaledValue { value: f64::NAN, scale: 0 }, &mut out),
            Err(CcError::Arithmetic(_))
        ));
    }

    #[test]
    fn scaled_value_rejects_bad_size() {
        let mut reader = PayloadReader::new(&[0x03, 0x00, 0x00, 0x00]);
        assert!(matches!(
            parse_scaled(&mut reader),
            Err(CcError::InvalidPayload(_))
        ));
    }

    #[test]
    fn bitmask_roundtrip() {
        let mask = encode_bitmask(&[1, 2, 9], 15, 0);
        assert_eq!(mask, vec![0b0000_0110, 0b0000_0010]);
        assert_eq!(parse_bitmask(&mask, 0), vec![1, 2, 9]);
        assert_eq!(parse_bitmask(&[0b1000_0001], 1), vec![1, 8]);
    }

    #[test]
    fn crc16_matches_reference_vector() {
        // CRC-16/AUG-CCITT check value for "123456789"
        assert_eq!(crc16(b"123456789"), 0xE5CC);
    }
}
