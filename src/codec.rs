use bytes::{Buf, BytesMut};
use std::io::{self, Cursor};
use tokio_util::codec::Decoder;

use crate::frame::{self, Frame, ProtocolError};

/// Splits the inbound byte stream into frames.
///
/// A malformed frame is yielded as an item rather than as a decoder error: `FramedRead` stops
/// for good after an error, while a bad request must not end the connection. Decoder errors are
/// reserved for transport problems.
pub struct FrameCodec {
    max_frame_size: usize,
    // What the buffered partial frame amounts to if the peer hangs up now.
    truncation: ProtocolError,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec {
            max_frame_size,
            truncation: ProtocolError::TruncatedFrame,
        }
    }
}

impl Decoder for FrameCodec {
    type Item = Result<Frame, ProtocolError>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.is_empty() {
            return Ok(None);
        }

        let mut cursor = Cursor::new(&src[..]);
        let parsed = Frame::parse(&mut cursor);
        let position = cursor.position() as usize;

        match parsed {
            Ok(frame) => {
                // Remove the parsed frame from the buffer.
                src.advance(position);
                Ok(Some(Ok(frame)))
            }
            Err(frame::Error::Incomplete(truncation)) => {
                // Check if the frame size exceeds a certain limit to prevent DoS attacks
                if src.len() > self.max_frame_size {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "frame size exceeds limit",
                    ));
                }

                self.truncation = truncation;
                Ok(None)
            }
            Err(frame::Error::Protocol(err)) => {
                // Drop the bytes the parser gave up on and resume after them.
                src.advance(position);
                Ok(Some(Err(err)))
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(item) => Ok(Some(item)),
            None if buf.is_empty() => Ok(None),
            None => {
                buf.clear();
                Ok(Some(Err(self.truncation.clone())))
            }
        }
    }
}
