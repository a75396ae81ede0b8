/// Errors that can occur when opening or using a controller stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open serial port {path}: {source}")]
    Open {
        path: String,
        source: serialport::Error,
    },

    /// Failed to connect to a TCP serial bridge.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The port specification could not be understood.
    #[error("invalid port specification '{0}'")]
    InvalidSpec(String),

    /// An I/O error occurred on the stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serial-port specific error occurred after the port was opened.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
