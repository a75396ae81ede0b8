//! Z-Wave command class codec.
//!
//! A command class (CC) is the application-level vocabulary carried inside
//! SendData and ApplicationCommand messages. This crate turns CC payload
//! bytes into typed [`CommandClass`] values and back:
//!
//! - one sum type per CC family under [`cc`], dispatched through a static
//!   registry keyed by CC id
//! - encapsulation (Multi Channel, Multi Command, CRC-16, Supervision,
//!   Security S0) unwrapped recursively at parse time, with a hard depth cap
//! - partial-report reassembly via [`PartialAssembler`]
//! - payload budgeting via [`compute_net_cc_payload_size`]
//!
//! Every decode path reads through [`PayloadReader`] so malformed radio
//! traffic fails with `PacketFormat_InvalidPayload` instead of panicking.

pub mod assemble;
pub mod cc;
pub mod command_class;
pub mod context;
pub mod error;
pub mod ids;
pub mod payload;
pub mod sizing;
pub mod traits;
pub mod values;

mod registry;

pub use assemble::{Assemble, Assembly, PartialAssembler, PartialKey};
pub use command_class::{Command, CommandClass, UnknownCc, MAX_ENCAPSULATION_DEPTH};
pub use context::{
    CcContext, Destination, NodeId, S0Ciphertext, SecurityManager, StaticContext,
    NODE_ID_BROADCAST,
};
pub use error::{CcError, Result};
pub use payload::{DurationValue, PayloadReader, ScaledValue};
pub use registry::is_known;
pub use sizing::{compute_net_cc_payload_size, max_payload_for_tx_options, TransmitOptions};
pub use traits::{Encapsulated, Encapsulating, Fragmentable, PartialReport, ValueReport};
pub use values::{ValueEntry, ValueId, ValueMetadata};
