//! Host-side Z-Wave serial API stack.
//!
//! The layers build on each other and can be used on their own:
//!
//! - [`transport`]: serial port or TCP bridge as a byte stream
//! - [`frame`]: SOF/ACK/NAK/CAN framing with checksums
//! - [`cc`]: typed command classes, encapsulation and partial reports
//! - [`message`]: serial API messages and their response/callback pairing
//! - [`config`]: device configuration database
//! - [`driver`]: transaction manager, node state and the async driver
//!   (behind the `driver` feature, on by default)

/// Re-export transport types.
pub mod transport {
    pub use zwave_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use zwave_frame::*;
}

/// Re-export command class types.
pub mod cc {
    pub use zwave_cc::*;
}

/// Re-export message types.
pub mod message {
    pub use zwave_message::*;
}

/// Re-export device configuration types.
pub mod config {
    pub use zwave_config::*;
}

/// Re-export driver types (requires `driver` feature).
#[cfg(feature = "driver")]
pub mod driver {
    pub use zwave_driver::*;
}
