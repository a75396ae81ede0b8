use std::fmt;
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::debug;

use crate::error::{Result, TransportError};

/// Baud rate mandated by the Z-Wave serial API.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

const TCP_SCHEME: &str = "tcp://";

/// Where the controller lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortSpec {
    /// A local serial device such as `/dev/ttyUSB0` or `COM3`.
    Serial(String),
    /// A TCP serial bridge, given as `host:port`.
    Tcp(String),
}

impl PortSpec {
    /// Parse a user supplied port string. `tcp://host:port` selects a bridge,
    /// anything else is treated as a device path.
    pub fn parse(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(TransportError::InvalidSpec(spec.to_string()));
        }
        match spec.strip_prefix(TCP_SCHEME) {
            Some(addr) if addr.contains(':') => Ok(Self::Tcp(addr.to_string())),
            Some(_) => Err(TransportError::InvalidSpec(spec.to_string())),
            None => Ok(Self::Serial(spec.to_string())),
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial(path) => f.write_str(path),
            Self::Tcp(addr) => write!(f, "{TCP_SCHEME}{addr}"),
        }
    }
}

/// Settings applied when a stream is opened.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Serial baud rate. Controllers only speak 115200.
    pub baud_rate: u32,
    /// Initial read timeout. Reads that hit it return `TimedOut`, which lets
    /// a reader loop notice shutdown requests.
    pub read_timeout: Duration,
    /// Timeout for establishing a TCP bridge connection.
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(100),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// A connected controller stream. Implements `Read + Write`.
pub struct SerialStream {
    inner: SerialStreamInner,
}

enum SerialStreamInner {
    Serial(Box<dyn SerialPort>),
    Tcp(TcpStream),
}

/// Open a stream to the controller described by `spec`.
pub fn open(spec: &str, config: &TransportConfig) -> Result<SerialStream> {
    match PortSpec::parse(spec)? {
        PortSpec::Serial(path) => SerialStream::open_serial(&path, config),
        PortSpec::Tcp(addr) => SerialStream::connect_tcp(&addr, config),
    }
}

impl SerialStream {
    /// Open a local serial device with the Z-Wave line settings (8N1, no flow control).
    pub fn open_serial(path: &str, config: &TransportConfig) -> Result<Self> {
        let port = serialport::new(path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|source| TransportError::Open {
                path: path.to_string(),
                source,
            })?;
        debug!(path, baud = config.baud_rate, "opened serial port");
        Ok(Self {
            inner: SerialStreamInner::Serial(port),
        })
    }

    /// Connect to a TCP serial bridge.
    pub fn connect_tcp(addr: &str, config: &TransportConfig) -> Result<Self> {
        let resolved = addr
            .to_socket_addrs()
            .map_err(|source| TransportError::Connect {
                addr: addr.to_string(),
                source,
            })?
            .next()
            .ok_or_else(|| TransportError::InvalidSpec(addr.to_string()))?;
        let stream = TcpStream::connect_timeout(&resolved, config.connect_timeout).map_err(
            |source| TransportError::Connect {
                addr: addr.to_string(),
                source,
            },
        )?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(config.read_timeout))?;
        debug!(addr, "connected to serial bridge");
        Ok(Self::from_tcp(stream))
    }

    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Self {
        Self {
            inner: SerialStreamInner::Tcp(stream),
        }
    }

    /// Set read timeout on the underlying stream. `None` blocks indefinitely
    /// on TCP; serial ports cannot block forever, so it maps to one hour.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port
                .set_timeout(timeout.unwrap_or(Duration::from_secs(3600)))
                .map_err(Into::into),
            SerialStreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream. Serial ports share one
    /// timeout for both directions, so this is a no-op there.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        match &mut self.inner {
            SerialStreamInner::Serial(_) => Ok(()),
            SerialStreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream so reads and writes can run on separate threads.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            SerialStreamInner::Serial(port) => SerialStreamInner::Serial(port.try_clone()?),
            SerialStreamInner::Tcp(stream) => SerialStreamInner::Tcp(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    /// Whether this stream is backed by a local serial device.
    pub fn is_serial(&self) -> bool {
        matches!(self.inner, SerialStreamInner::Serial(_))
    }
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port.read(buf),
            SerialStreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port.write(buf),
            SerialStreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port.flush(),
            SerialStreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            SerialStreamInner::Serial(port) => f
                .debug_struct("SerialStream")
                .field("type", &"serial")
                .field("name", &port.name())
                .finish(),
            SerialStreamInner::Tcp(stream) => f
                .debug_struct("SerialStream")
                .field("type", &"tcp")
                .field("peer", &stream.peer_addr().ok())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn parses_port_specs() {
        assert_eq!(
            PortSpec::parse("/dev/ttyUSB0").unwrap(),
            PortSpec::Serial("/dev/ttyUSB0".to_string())
        );
        assert_eq!(
            PortSpec::parse("tcp://192.168.1.10:4001").unwrap(),
            PortSpec::Tcp("192.168.1.10:4001".to_string())
        );
        assert!(matches!(
            PortSpec::parse("tcp://nohost"),
            Err(TransportError::InvalidSpec(_))
        ));
        assert!(matches!(
            PortSpec::parse("  "),
            Err(TransportError::InvalidSpec(_))
        ));
    }

    #[test]
    fn port_spec_display_roundtrip() {
        let spec = PortSpec::parse("tcp://localhost:5000").unwrap();
        assert_eq!(spec.to_string(), "tcp://localhost:5000");
        assert_eq!(PortSpec::parse(&spec.to_string()).unwrap(), spec);
    }

    #[test]
    fn tcp_bridge_roundtrip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1];
            sock.read_exact(&mut buf).unwrap();
            sock.write_all(&[0x06]).unwrap();
            buf[0]
        });

        let mut stream = open(&format!("tcp://{addr}"), &TransportConfig::default()).unwrap();
        assert!(!stream.is_serial());
        stream.write_all(&[0x15]).unwrap();
        stream.flush().unwrap();
        let mut ack = [0u8; 1];
        stream.read_exact(&mut ack).unwrap();

        assert_eq!(ack, [0x06]);
        assert_eq!(server.join().unwrap(), 0x15);
    }

    #[test]
    fn tcp_stream_clones_share_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 2];
            sock.read_exact(&mut buf).unwrap();
            buf
        });

        let stream = open(&format!("tcp://{addr}"), &TransportConfig::default()).unwrap();
        let mut a = stream.try_clone().unwrap();
        let mut b = stream;
        a.write_all(&[0x01]).unwrap();
        b.write_all(&[0x02]).unwrap();

        assert_eq!(server.join().unwrap(), [0x01, 0x02]);
        assert!(format!("{b:?}").contains("tcp"));
    }

    #[test]
    fn missing_serial_device_reports_open_error() {
        let err = open(
            "/dev/zwave-does-not-exist-0",
            &TransportConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }
}
