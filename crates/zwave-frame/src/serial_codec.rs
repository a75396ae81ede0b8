//! `tokio_util::codec` adapter for async controller streams.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{encode_frame, try_decode, Frame, ReadEvent};
use crate::error::FrameError;

/// Frames a byte stream into [`ReadEvent`]s and encodes outgoing [`Frame`]s.
///
/// Corrupt frames and garbage are yielded as events rather than errors, so
/// a single bad unit never tears down a `Framed` stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialCodec;

impl SerialCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for SerialCodec {
    type Item = ReadEvent;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(try_decode(src))
    }
}

impl Encoder<Frame> for SerialCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst)
    }
}

impl Encoder<&Frame> for SerialCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::Framed;

    use super::*;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (left, right) = tokio::io::duplex(1024);
        let mut host = Framed::new(left, SerialCodec::new());
        let mut controller = Framed::new(right, SerialCodec::new());

        host.send(Frame::request(0x15, Vec::new())).await.unwrap();
        let event = controller.next().await.unwrap().unwrap();
        assert!(matches!(
            event,
            ReadEvent::Frame(Frame::Data(ref data)) if data.function_id == 0x15
        ));

        controller.send(Frame::Ack).await.unwrap();
        controller
            .send(Frame::response(0x15, b"Z-Wave 7.16\0\x07".to_vec()))
            .await
            .unwrap();

        assert!(matches!(
            host.next().await.unwrap().unwrap(),
            ReadEvent::Frame(Frame::Ack)
        ));
        assert!(matches!(
            host.next().await.unwrap().unwrap(),
            ReadEvent::Frame(Frame::Data(_))
        ));
    }

    #[test]
    fn decoder_yields_none_on_partial_frame() {
        let mut codec = SerialCodec::new();
        let mut buf = BytesMut::from(&[0x01, 0x03, 0x00][..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
