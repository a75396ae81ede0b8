use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::NodeId;

/// Identifies one cached value on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValueId {
    pub node_id: NodeId,
    pub endpoint: u8,
    pub cc_id: u16,
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_key: Option<String>,
}

/// Describes how a value may be presented and changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueMetadata {
    pub label: String,
    pub readable: bool,
    pub writeable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ValueMetadata {
    pub fn read_only(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            readable: true,
            writeable: false,
            min: None,
            max: None,
            unit: None,
        }
    }

    pub fn level(label: impl Into<String>, max: f64) -> Self {
        Self {
            label: label.into(),
            readable: true,
            writeable: true,
            min: Some(0.0),
            max: Some(max),
            unit: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// One value extracted from a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueEntry {
    pub property: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property_key: Option<String>,
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ValueMetadata>,
}

impl ValueEntry {
    pub fn new(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            property_key: None,
            value: value.into(),
            metadata: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.property_key = Some(key.into());
        self
    }

    pub fn with_metadata(mut self, metadata: ValueMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Address this entry on a node's endpoint.
    pub fn id(&self, node_id: NodeId, endpoint: u8, cc_id: u16) -> ValueId {
        ValueId {
            node_id,
            endpoint,
            cc_id,
            property: self.property.clone(),
            property_key: self.property_key.clone(),
        }
    }
}
