use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::FrameError;
use crate::escape::escape;
use crate::frame::{EOL, Frame, NULL};
use crate::parser::parse_frame;

/// Default upper bound on a single inbound frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Append the wire encoding of `frame` to `dst`.
///
/// Layout: command, EOL, one `key:value` EOL line per header (both sides
/// escaped), a blank EOL, the raw body, NULL, and a trailing EOL.
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) {
    dst.extend_from_slice(frame.command.as_str().as_bytes());
    dst.put_u8(EOL);
    for (k, v) in &frame.headers {
        dst.extend_from_slice(escape(k).as_bytes());
        dst.put_u8(b':');
        dst.extend_from_slice(escape(v).as_bytes());
        dst.put_u8(EOL);
    }
    dst.put_u8(EOL);
    dst.extend_from_slice(&frame.body);
    dst.put_u8(NULL);
    dst.put_u8(EOL);
}

/// `StompCodec` implements `tokio_util::codec::{Decoder, Encoder}` for the
/// STOMP wire protocol.
///
/// Decoding consumes a whole frame (through its NULL terminator) from the
/// buffer before parsing it, so a malformed frame is dropped and the next
/// call starts cleanly on the following frame. Lone EOL bytes between frames
/// (heart-beats, frame trailers) are skipped.
pub struct StompCodec {
    max_frame_size: usize,
}

impl StompCodec {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// A codec that rejects inbound frames larger than `max_frame_size`.
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for StompCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for StompCodec {
    type Item = Frame;
    type Error = FrameError;

    /// Decode bytes from `src` into a `Frame`.
    ///
    /// Returns
    /// - `Ok(Some(Frame))` when a full frame was decoded; its bytes are
    ///   consumed from `src`.
    /// - `Ok(None)` when more bytes are required.
    /// - `Err(FrameError)` when the frame was malformed. Its bytes are
    ///   consumed as well, so decoding may continue with the rest of `src`.
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let leading = src
            .iter()
            .take_while(|&&b| b == EOL || b == b'\r')
            .count();
        src.advance(leading);

        match src.iter().position(|&b| b == NULL) {
            Some(nul) if nul + 1 > self.max_frame_size => {
                src.advance(nul + 1);
                Err(FrameError::TooLarge {
                    limit: self.max_frame_size,
                })
            }
            Some(nul) => {
                let raw = src.split_to(nul + 1);
                parse_frame(&raw).map(Some)
            }
            None if src.len() > self.max_frame_size => {
                src.clear();
                Err(FrameError::TooLarge {
                    limit: self.max_frame_size,
                })
            }
            None => Ok(None),
        }
    }
}

impl Encoder<Frame> for StompCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        <Self as Encoder<&Frame>>::encode(self, &item, dst)
    }
}

impl Encoder<&Frame> for StompCodec {
    type Error = FrameError;

    /// Validate `item` and append its wire encoding to `dst`.
    fn encode(&mut self, item: &Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.validate()?;
        encode_frame(item, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Command;

    #[test]
    fn encodes_trailer_after_null() {
        let f = Frame::new(Command::Send).set_body(b"hi".to_vec());
        let mut buf = BytesMut::new();
        encode_frame(&f, &mut buf);
        assert_eq!(&buf[..], b"SEND\n\nhi\x00\n");
    }

    #[test]
    fn decode_waits_for_terminator() {
        let mut codec = StompCodec::new();
        let mut buf = BytesMut::from(&b"MESSAGE\ndestination:/q\n\nhel"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"lo\x00\n");
        let f = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(f.body, b"hello");
        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn malformed_frame_is_consumed() {
        let mut codec = StompCodec::new();
        let mut buf = BytesMut::from(&b"BOGUS\n\n\x00\nRECEIPT\nreceipt-id:1\n\n\x00\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(FrameError::UnknownCommand(_))
        ));
        let f = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(f.command, Command::Receipt);
    }

    #[test]
    fn oversized_buffer_is_discarded() {
        let mut codec = StompCodec::with_max_frame_size(8);
        let mut buf = BytesMut::from(&b"SEND\nheader:0123456789"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(FrameError::TooLarge { limit: 8 })
        ));
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_complete_frame_is_rejected() {
        let mut codec = StompCodec::with_max_frame_size(12);
        let mut buf =
            BytesMut::from(&b"SEND\nheader:0123456789\n\n\x00\nRECEIPT\n\n\x00\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(FrameError::TooLarge { limit: 12 })
        ));
        // Only the offending frame is consumed.
        let f = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(f.command, Command::Receipt);
    }

    #[test]
    fn encoder_rejects_unknown_command() {
        let mut codec = StompCodec::new();
        let mut buf = BytesMut::new();
        assert!(codec.encode(&Frame::default(), &mut buf).is_err());
        assert!(buf.is_empty());
    }
}
