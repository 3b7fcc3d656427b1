use futures::StreamExt;
use std::io;
use thiserror::Error as ThisError;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::config::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_FRAME_SIZE};
use crate::frame::{Frame, ProtocolError};

#[derive(Debug, ThisError)]
pub enum Error {
    /// The peer sent a malformed frame. The connection is still usable.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    /// Reading from or writing to the socket failed. The connection is done.
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub struct Connection {
    pub id: Uuid,
    // Data is read from the socket into the codec's read buffer. When a frame is parsed, the
    // corresponding data is removed from the buffer.
    reader: FramedRead<OwnedReadHalf, FrameCodec>,
    writer: BufWriter<OwnedWriteHalf>,
}

impl Connection {
    pub fn new(stream: TcpStream) -> Connection {
        Connection::with_limits(stream, DEFAULT_BUFFER_SIZE, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_limits(stream: TcpStream, buffer_size: usize, max_frame_size: usize) -> Connection {
        let (reader, writer) = stream.into_split();

        Connection {
            id: Uuid::new_v4(),
            reader: FramedRead::with_capacity(reader, FrameCodec::new(max_frame_size), buffer_size),
            writer: BufWriter::new(writer),
        }
    }

    /// Reads the next frame. `Ok(None)` means the peer closed the connection between frames.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        match self.reader.next().await {
            Some(Ok(Ok(frame))) => Ok(Some(frame)),
            Some(Ok(Err(err))) => Err(Error::Protocol(err)),
            Some(Err(err)) => Err(Error::Io(err)),
            None => Ok(None),
        }
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        self.writer.write_all(&frame.serialize()).await?;
        self.writer.flush().await
    }
}
