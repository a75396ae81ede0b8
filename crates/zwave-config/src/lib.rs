//! Device configuration for Z-Wave nodes.
//!
//! Device files map a manufacturer/product triple (from Manufacturer
//! Specific Report) to a label, configuration parameter metadata and
//! compatibility flags. Files are validated against JSON Schemas embedded
//! in this crate before they are deserialized.
//!
//! The database is loaded once and then shared read-only. Nothing in the
//! codec layers reads it directly; the driver consults it when building
//! its parse context.

pub mod config;
pub mod database;
pub mod device;
pub mod error;
pub mod handle;

mod validator;

pub use config::LoaderConfig;
pub use database::{DeviceDatabase, MANUFACTURERS_FILE};
pub use device::{Compat, DeviceConfig, DeviceKey, ParamInfo};
pub use error::{ConfigError, Result};
pub use handle::ConfigHandle;
