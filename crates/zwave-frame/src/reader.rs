use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use tracing::debug;
use zwave_transport::SerialStream;

use crate::codec::{try_decode, FrameConfig, ReadEvent, MAX_FRAME_LEN};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 4 * MAX_FRAME_LEN;
const READ_CHUNK_SIZE: usize = 256;

/// Reads link-layer units from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete frames,
/// corrupt-frame notifications, or skipped garbage.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next unit (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    /// Read timeouts surface as `FrameError::Io` with `TimedOut` or
    /// `WouldBlock`; buffered bytes are kept, so the call can be repeated.
    pub fn read_event(&mut self) -> Result<ReadEvent> {
        loop {
            if let Some(event) = try_decode(&mut self.buf) {
                if let ReadEvent::Discarded(bytes) = &event {
                    debug!(len = bytes.len(), "skipped bytes outside any frame");
                }
                return Ok(event);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Number of received bytes not yet decoded.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partially received frame.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<SerialStream> {
    /// Create a frame reader for a controller stream and apply the read timeout from config.
    pub fn with_config_serial(mut inner: SerialStream, config: FrameConfig) -> Result<Self> {
        if config.read_timeout.is_some() {
            inner
                .set_read_timeout(config.read_timeout)
                .map_err(transport_to_frame_error)?;
        }
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: zwave_transport::TransportError) -> FrameError {
    match err {
        zwave_transport::TransportError::Io(io) => FrameError::Io(io),
        zwave_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::codec::{encode_frame, Frame};

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut out = BytesMut::new();
        for frame in frames {
            encode_frame(frame, &mut out).unwrap();
        }
        out.to_vec()
    }

    #[test]
    fn read_single_frame() {
        let bytes = wire(&[Frame::request(0x15, Vec::new())]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        let event = reader.read_event().unwrap();
        assert!(matches!(
            event,
            ReadEvent::Frame(Frame::Data(ref data)) if data.function_id == 0x15
        ));
    }

    #[test]
    fn read_control_and_data_frames_in_order() {
        let bytes = wire(&[
            Frame::Ack,
            Frame::response(0x13, vec![0x01]),
            Frame::Can,
        ]);
        let mut reader = FrameReader::new(Cursor::new(bytes));

        assert!(matches!(reader.read_event().unwrap(), ReadEvent::Frame(Frame::Ack)));
        assert!(matches!(
            reader.read_event().unwrap(),
            ReadEvent::Frame(Frame::Data(_))
        ));
        assert!(matches!(reader.read_event().unwrap(), ReadEvent::Frame(Frame::Can)));
        assert!(matches!(
            reader.read_event().unwrap_err(),
            FrameError::ConnectionClosed
        ));
    }

    #[test]
    fn partial_read_handling() {
        let bytes = wire(&[Frame::request(0x04, vec![0x00, 0x02, 0x02, 0x20, 0x02])]);
        let mut reader = FrameReader::new(ByteByByteReader { bytes, pos: 0 });

        let event = reader.read_event().unwrap();
        assert!(matches!(event, ReadEvent::Frame(Frame::Data(_))));
        assert_eq!(reader.buffered_len(), 0);
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut bytes = wire(&[Frame::request(0x04, vec![0x00, 0x02])]);
        bytes.truncate(4);
        let mut reader = FrameReader::new(Cursor::new(bytes));
        let err = reader.read_event().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn corrupt_frame_is_reported_not_fatal() {
        let mut bytes = wire(&[Frame::request(0x04, vec![0x00])]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        bytes.extend(wire(&[Frame::Ack]));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_event().unwrap(),
            ReadEvent::Corrupt(FrameError::Checksum { .. })
        ));
        assert!(matches!(reader.read_event().unwrap(), ReadEvent::Frame(Frame::Ack)));
    }

    #[test]
    fn timed_out_read_keeps_buffer() {
        let full = wire(&[Frame::response(0x15, vec![0x5a, 0x00])]);
        let reader = TimeoutBetweenChunks {
            chunks: vec![full[..3].to_vec(), full[3..].to_vec()],
            timed_out: false,
        };
        let mut framed = FrameReader::new(reader);

        let err = framed.read_event().unwrap_err();
        assert!(matches!(err, FrameError::Io(ref e) if e.kind() == ErrorKind::TimedOut));
        assert_eq!(framed.buffered_len(), 3);

        assert!(matches!(
            framed.read_event().unwrap(),
            ReadEvent::Frame(Frame::Data(_))
        ));
    }

    #[test]
    fn interrupted_read_retries() {
        let bytes = wire(&[Frame::Nak]);
        let mut framed = FrameReader::new(InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(bytes),
        });
        assert!(matches!(framed.read_event().unwrap(), ReadEvent::Frame(Frame::Nak)));
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        reader.clear();
        assert_eq!(reader.config().read_timeout, None);
        let _inner = reader.into_inner();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct TimeoutBetweenChunks {
        chunks: Vec<Vec<u8>>,
        timed_out: bool,
    }

    impl Read for TimeoutBetweenChunks {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.chunks.len() == 1 && !self.timed_out {
                self.timed_out = true;
                return Err(std::io::Error::from(ErrorKind::TimedOut));
            }
            if self.chunks.is_empty() {
                return Ok(0);
            }
            let chunk = self.chunks.remove(0);
            buf[..chunk.len()].copy_from_slice(&chunk);
            Ok(chunk.len())
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
