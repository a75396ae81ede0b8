//! Device file contents.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use zwave_cc::cc::thermostat_setpoint::SetpointInterpretation;

/// Manufacturer, product type and product id as reported by
/// Manufacturer Specific Report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DeviceKey {
    pub manufacturer_id: u16,
    pub product_type: u16,
    pub product_id: u16,
}

impl DeviceKey {
    pub fn new(manufacturer_id: u16, product_type: u16, product_id: u16) -> Self {
        Self {
            manufacturer_id,
            product_type,
            product_id,
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04x}:0x{:04x}:0x{:04x}",
            self.manufacturer_id, self.product_type, self.product_id
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProductRef {
    #[serde(deserialize_with = "hex_u16")]
    pub product_type: u16,
    #[serde(deserialize_with = "hex_u16")]
    pub product_id: u16,
}

/// One configuration parameter a device exposes through the
/// Configuration CC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParamInfo {
    #[serde(rename = "#")]
    pub number: u8,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    pub value_size: u8,
    pub min_value: i64,
    pub max_value: i64,
    pub default_value: i64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub read_only: bool,
}

impl ParamInfo {
    pub fn accepts(&self, value: i64) -> bool {
        (self.min_value..=self.max_value).contains(&value)
    }
}

/// Per-device deviations from the protocol the driver has to honour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Compat {
    /// Forces a Thermostat Setpoint bitmask layout instead of probing.
    #[serde(default)]
    pub setpoint_interpretation: Option<SetpointInterpretation>,
    /// Keep the node awake after its queue drains.
    #[serde(default)]
    pub no_wake_up_no_more_information: bool,
    /// Overrides the driver's node report timeout.
    #[serde(default)]
    pub report_timeout_ms: Option<u64>,
}

impl Compat {
    pub fn report_timeout(&self) -> Option<Duration> {
        self.report_timeout_ms.map(Duration::from_millis)
    }
}

/// A device definition after schema validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceConfig {
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(deserialize_with = "hex_u16")]
    pub manufacturer_id: u16,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    pub(crate) devices: Vec<ProductRef>,
    #[serde(default)]
    pub param_information: Vec<ParamInfo>,
    #[serde(default)]
    pub compat: Compat,
}

impl DeviceConfig {
    /// Every manufacturer/product triple this file describes.
    pub fn keys(&self) -> impl Iterator<Item = DeviceKey> + '_ {
        self.devices.iter().map(|product| {
            DeviceKey::new(self.manufacturer_id, product.product_type, product.product_id)
        })
    }

    pub fn param(&self, number: u8) -> Option<&ParamInfo> {
        self.param_information
            .iter()
            .find(|param| param.number == number)
    }
}

pub(crate) fn parse_hex_u16(text: &str) -> Option<u16> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))?;
    u16::from_str_radix(digits, 16).ok()
}

fn hex_u16<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let text = String::deserialize(deserializer)?;
    parse_hex_u16(&text)
        .ok_or_else(|| serde::de::Error::custom(format!("expected 0xNNNN, got {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_ids() {
        assert_eq!(parse_hex_u16("0x0086"), Some(0x0086));
        assert_eq!(parse_hex_u16("0XFFFF"), Some(0xFFFF));
        assert_eq!(parse_hex_u16("0086"), None);
        assert_eq!(parse_hex_u16("0x10000"), None);
    }

    #[test]
    fn device_config_from_json() {
        let device: DeviceConfig = serde_json::from_str(
            r##"{
                "manufacturerId": "0x0086",
                "label": "ZW100",
                "devices": [
                    { "productType": "0x0002", "productId": "0x0064" },
                    { "productType": "0x0102", "productId": "0x0064" }
                ],
                "paramInformation": [
                    { "#": 3, "label": "PIR timeout", "valueSize": 2,
                      "minValue": 10, "maxValue": 3600, "defaultValue": 240, "unit": "s" }
                ],
                "compat": { "setpointInterpretation": "B", "reportTimeoutMs": 2000 }
            }"##,
        )
        .unwrap();

        let keys: Vec<_> = device.keys().collect();
        assert_eq!(
            keys,
            vec![
                DeviceKey::new(0x0086, 0x0002, 0x0064),
                DeviceKey::new(0x0086, 0x0102, 0x0064)
            ]
        );
        let param = device.param(3).unwrap();
        assert!(param.accepts(240));
        assert!(!param.accepts(5));
        assert_eq!(
            device.compat.setpoint_interpretation,
            Some(SetpointInterpretation::B)
        );
        assert_eq!(device.compat.report_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(keys[0].to_string(), "0x0086:0x0002:0x0064");
    }
}
