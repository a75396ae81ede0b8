//! Byte stream abstraction for Z-Wave controllers.
//!
//! A Z-Wave controller is reached over a UART. In practice that UART shows
//! up either as a local serial device or as a TCP socket exposed by a serial
//! bridge (ser2net and friends). This crate hides the difference behind
//! [`SerialStream`], which is the lowest layer of the stack.

pub mod error;
pub mod stream;

pub use error::{Result, TransportError};
pub use stream::{open, PortSpec, SerialStream, TransportConfig, DEFAULT_BAUD_RATE};
