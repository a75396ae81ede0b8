use serde::Serialize;

use crate::cc::unknown_command;
use crate::command_class::ParseScope;
use crate::error::Result;
use crate::ids;
use crate::payload::PayloadReader;
use crate::traits::ValueReport;
use crate::validate_payload;
use crate::values::{ValueEntry, ValueMetadata};

const GET: u8 = 0x04;
const REPORT: u8 = 0x05;
const DEVICE_SPECIFIC_GET: u8 = 0x06;
const DEVICE_SPECIFIC_REPORT: u8 = 0x07;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManufacturerSpecificCommand {
    Get,
    Report {
        manufacturer_id: u16,
        product_type: u16,
        product_id: u16,
    },
    DeviceSpecificGet {
        device_id_type: u8,
    },
    DeviceSpecificReport {
        device_id_type: u8,
        /// 0 is UTF-8, 1 is binary.
        data_format: u8,
        data: Vec<u8>,
    },
}

impl ManufacturerSpecificCommand {
    pub fn command_id(&self) -> u8 {
        match self {
            Self::Get => GET,
            Self::Report { .. } => REPORT,
            Self::DeviceSpecificGet { .. } => DEVICE_SPECIFIC_GET,
            Self::DeviceSpecificReport { .. } => DEVICE_SPECIFIC_REPORT,
        }
    }

    pub(crate) fn parse(command: u8, body: &[u8], _scope: &ParseScope<'_>) -> Result<Self> {
        let mut reader = PayloadReader::new(body);
        match command {
            GET => Ok(Self::Get),
            REPORT => Ok(Self::Report {
                manufacturer_id: reader.u16()?,
                product_type: reader.u16()?,
                product_id: reader.u16()?,
            }),
            DEVICE_SPECIFIC_GET => Ok(Self::DeviceSpecificGet {
                device_id_type: reader.u8()? & 0x07,
            }),
            DEVICE_SPECIFIC_REPORT => {
                let device_id_type = reader.u8()? & 0x07;
                let format_and_len = reader.u8()?;
                let data_format = format_and_len >> 5;
                let len = (format_and_len & 0x1F) as usize;
                validate_payload!(data_format <= 1, len > 0);
                Ok(Self::DeviceSpecificReport {
                    device_id_type,
                    data_format,
                    data: reader.bytes(len)?.to_vec(),
                })
            }
            other => Err(unknown_command(ids::MANUFACTURER_SPECIFIC, other)),
        }
    }

    pub(crate) fn encode(&self, out: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Get => {}
            Self::Report {
                manufacturer_id,
                product_type,
                product_id,
            } => {
                out.extend_from_slice(&manufacturer_id.to_be_bytes());
                out.extend_from_slice(&product_type.to_be_bytes());
                out.extend_from_slice(&product_id.to_be_bytes());
            }
            Self::DeviceSpecificGet { device_id_type } => out.push(device_id_type & 0x07),
            Self::DeviceSpecificReport {
                device_id_type,
                data_format,
                data,
            } => {
                if data.is_empty() || data.len() > 0x1F {
                    return Err(crate::CcError::Argument(format!(
                        "device id must be 1..=31 bytes, got {}",
                        data.len()
                    )));
                }
                out.push(device_id_type & 0x07);
                out.push((data_format << 5) | data.len() as u8);
                out.extend_from_slice(data);
            }
        }
        Ok(())
    }
}

impl ValueReport for ManufacturerSpecificCommand {
    fn values(&self) -> Vec<ValueEntry> {
        match self {
            Self::Report {
                manufacturer_id,
                product_type,
                product_id,
            } => vec![
                ValueEntry::new("manufacturerId", *manufacturer_id)
                    .with_metadata(ValueMetadata::read_only("Manufacturer ID")),
                ValueEntry::new("productType", *product_type)
                    .with_metadata(ValueMetadata::read_only("Product type")),
                ValueEntry::new("productId", *product_id)
                    .with_metadata(ValueMetadata::read_only("Product ID")),
            ],
            Self::DeviceSpecificReport {
                device_id_type,
                data_format,
                data,
            } => {
                let rendered = if *data_format == 0 {
                    String::from_utf8_lossy(data).into_owned()
                } else {
                    data.iter().map(|b| format!("{b:02x}")).collect()
                };
                vec![ValueEntry::new("deviceId", rendered).with_key(device_id_type.to_string())]
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
    fn report_from_wire() {
        let cc = reencode(&[0x72, 0x05, 0x00, 0x86, 0x00, 0x02, 0x00, 0x82]);
        assert_eq!(
            cc.command,
            Command::ManufacturerSpecific(ManufacturerSpecificCommand::Report {
                manufacturer_id: 0x0086,
                product_type: 0x0002,
                product_id: 0x0082,
            })
        );
        let values = cc.values();
        assert_eq!(values[0].value, serde_json::json!(0x86));
    }

    #[test]
    fn truncated_report_is_invalid() {
        let err = crate::CommandClass::parse(
            &[0x72, 0x05, 0x00, 0x86, 0x00],
            2,
            &crate::StaticContext::new(1),
        )
        .unwrap_err();
        assert!(matches!(err, crate::CcError::InvalidPayload(_)));
    }

    #[test]
    fn device_specific_report_binary_serial() {
        let cc = reencode(&[0x72, 0x07, 0x01, 0x23, 0xDE, 0xAD, 0xBE]);
        assert_eq!(cc.values()[0].value, serde_json::json!("deadbe"));
    }
}
