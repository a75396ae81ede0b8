use jsonschema::Validator;
use serde_json::Value;

use crate::error::{ConfigError, Result};

pub(crate) const DEVICE_SCHEMA: &str = include_str!("../schemas/device.schema.json");
pub(crate) const MANUFACTURERS_SCHEMA: &str = include_str!("../schemas/manufacturers.schema.json");

/// The compiled embedded schemas.
pub(crate) struct Schemas {
    pub device: Validator,
    pub manufacturers: Validator,
}

impl Schemas {
    pub fn compile() -> Result<Self> {
        Ok(Self {
            device: compile(DEVICE_SCHEMA)?,
            manufacturers: compile(MANUFACTURERS_SCHEMA)?,
        })
    }
}

fn compile(schema_json: &str) -> Result<Validator> {
    let schema: Value = serde_json::from_str(schema_json)?;
    jsonschema::validator_for(&schema).map_err(|err| ConfigError::CompileFailed(err.to_string()))
}

/// Check `value` against `validator`, reporting up to four violations.
pub(crate) fn validate_document(file: &str, value: &Value, validator: &Validator) -> Result<()> {
    let mut errors = validator.iter_errors(value);
    if let Some(first) = errors.next() {
        let mut message = first.to_string();
        for err in errors.take(3) {
            message.push_str("; ");
            message.push_str(&err.to_string());
        }
        return Err(ConfigError::ValidationFailed {
            file: file.to_string(),
            message,
        });
    }

    Ok(())
}
