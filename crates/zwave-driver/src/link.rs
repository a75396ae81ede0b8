//! Async access to the controller.
//!
//! TCP bridges are opened with tokio directly. Serial ports have no tokio
//! driver in this stack, so the blocking [`SerialStream`] is pumped into an
//! in-memory duplex by two plain threads.

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::{debug, warn};
use zwave_transport::{PortSpec, SerialStream, TransportConfig, TransportError};

use crate::error::Result;

/// Anything the driver can run over.
pub trait LinkIo: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> LinkIo for T {}

pub type BoxedLink = Box<dyn LinkIo>;

const PUMP_BUFFER: usize = 4096;

/// Open `spec` (`/dev/ttyUSB0`, `COM3` or `tcp://host:port`).
pub async fn connect(spec: &str, config: &TransportConfig) -> Result<BoxedLink> {
    match PortSpec::parse(spec)? {
        PortSpec::Tcp(addr) => {
            let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
                .await
                .map_err(|_| TransportError::Connect {
                    addr: addr.clone(),
                    source: ErrorKind::TimedOut.into(),
                })?
                .map_err(|source| TransportError::Connect {
                    addr: addr.clone(),
                    source,
                })?;
            stream.set_nodelay(true).map_err(TransportError::Io)?;
            debug!(%addr, "connected to serial bridge");
            Ok(Box::new(stream))
        }
        PortSpec::Serial(path) => {
            let config = config.clone();
            let stream = tokio::task::spawn_blocking(move || SerialStream::open_serial(&path, &config))
                .await
                .map_err(|err| TransportError::Io(std::io::Error::other(err)))??;
            Ok(Box::new(bridge(stream)?))
        }
    }
}

/// Pump a blocking stream through a tokio duplex. The threads exit when
/// either side closes.
pub fn bridge(stream: SerialStream) -> Result<tokio::io::DuplexStream> {
    let handle = Handle::current();
    let (ours, theirs) = tokio::io::duplex(PUMP_BUFFER);
    let (mut from_driver, mut to_driver) = tokio::io::split(theirs);
    let mut reader = stream.try_clone()?;
    let mut writer = stream;
    let closed = Arc::new(AtomicBool::new(false));

    let reader_closed = Arc::clone(&closed);
    let reader_handle = handle.clone();
    std::thread::Builder::new()
        .name("zwave-serial-rx".into())
        .spawn(move || {
            let mut buf = [0u8; PUMP_BUFFER];
            while !reader_closed.load(Ordering::Acquire) {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if reader_handle
                            .block_on(to_driver.write_all(&buf[..n]))
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(err)
                        if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
                    Err(err) => {
                        warn!(error = %err, "serial read failed");
                        break;
                    }
                }
            }
            reader_closed.store(true, Ordering::Release);
            let _ = reader_handle.block_on(to_driver.shutdown());
        })
        .map_err(TransportError::Io)?;

    std::thread::Builder::new()
        .name("zwave-serial-tx".into())
        .spawn(move || {
            let mut buf = [0u8; PUMP_BUFFER];
            loop {
                match handle.block_on(from_driver.read(&mut buf)) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if let Err(err) = writer.write_all(&buf[..n]).and_then(|()| writer.flush()) {
                            warn!(error = %err, "serial write failed");
                            break;
                        }
                    }
                }
            }
            closed.store(true, Ordering::Release);
        })
        .map_err(TransportError::Io)?;

    Ok(ours)
}
