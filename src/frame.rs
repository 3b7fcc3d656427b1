// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::Buf;
use bytes::Bytes;
use std::io::Cursor;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

/// Arrays nested deeper than this are rejected instead of recursing further.
const MAX_DEPTH: usize = 512;

/// A framing failure. Reported to the client as a simple error, the connection stays open.
#[derive(Debug, Clone, ThisError, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("ERR Protocol error: unrecognized type {0:?}")]
    UnrecognizedType(char),
    #[error("ERR Protocol error: invalid length")]
    InvalidLength,
    #[error("ERR Protocol error: invalid number")]
    InvalidNumber,
    #[error("ERR Protocol error: truncated blob")]
    TruncatedBlob,
    #[error("ERR Protocol error: truncated frame")]
    TruncatedFrame,
    #[error("ERR Protocol error: missing terminator")]
    MissingTerminator,
    #[error("ERR Protocol error: invalid null value")]
    InvalidNull,
    #[error("ERR Protocol error: invalid verbatim string")]
    InvalidVerbatim,
    #[error("ERR Protocol error: nesting too deep")]
    TooDeep,
}

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    /// Not enough data is buffered to parse an entire frame. The wrapped error is what the
    /// partial frame amounts to if the stream ends now.
    #[error("not enough data is available to parse an entire frame")]
    Incomplete(ProtocolError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(Bytes),
    Error(Bytes),
    Integer(i64),
    Bulk(Bytes),
    Verbatim { format: [u8; 3], data: Bytes },
    Null,
    Array(Vec<Frame>),
}

// Protocol specification: https://redis.io/docs/reference/protocol-spec/
impl Frame {
    pub fn simple(s: impl Into<Bytes>) -> Frame {
        Frame::Simple(s.into())
    }

    pub fn error(msg: impl Into<String>) -> Frame {
        Frame::Error(Bytes::from(msg.into()))
    }

    /// Parses one frame starting at the cursor position.
    ///
    /// On success the cursor is left right after the frame. On a protocol error the cursor is
    /// left after the offending bytes, so the caller can discard them and carry on with the
    /// next frame.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        parse_frame(src, 0)
    }

    /// The name of the wire type, as used in error replies.
    pub fn type_name(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "simple error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(_) => "blob string",
            Frame::Verbatim { .. } => "verbatim string",
            Frame::Null => "null",
            Frame::Array(_) => "array",
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.encode(&mut bytes);
        bytes
    }

    fn encode(&self, dst: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                dst.push(u8::from(DataType::SimpleString));
                dst.extend_from_slice(s);
                dst.extend_from_slice(CRLF);
            }
            Frame::Error(s) => {
                dst.push(u8::from(DataType::SimpleError));
                dst.extend_from_slice(s);
                dst.extend_from_slice(CRLF);
            }
            Frame::Integer(i) => {
                dst.push(u8::from(DataType::Integer));
                dst.extend_from_slice(i.to_string().as_bytes());
                dst.extend_from_slice(CRLF);
            }
            Frame::Bulk(bytes) => {
                dst.push(u8::from(DataType::BulkString));
                dst.extend_from_slice(bytes.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(bytes);
                dst.extend_from_slice(CRLF);
            }
            Frame::Verbatim { format, data } => {
                dst.push(u8::from(DataType::VerbatimString));
                dst.extend_from_slice((format.len() + 1 + data.len()).to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                dst.extend_from_slice(format);
                dst.push(b':');
                dst.extend_from_slice(data);
                dst.extend_from_slice(CRLF);
            }
            Frame::Null => {
                dst.push(u8::from(DataType::Null));
                dst.extend_from_slice(CRLF);
            }
            Frame::Array(arr) => {
                dst.push(u8::from(DataType::Array));
                dst.extend_from_slice(arr.len().to_string().as_bytes());
                dst.extend_from_slice(CRLF);
                for frame in arr {
                    frame.encode(dst);
                }
            }
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", String::from_utf8_lossy(s)),
            Frame::Error(s) => write!(f, "-{}", String::from_utf8_lossy(s)),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Verbatim { format, data } => write!(
                f,
                "={}:{}",
                String::from_utf8_lossy(format),
                String::from_utf8_lossy(data)
            ),
            Frame::Null => write!(f, "_"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
        }
    }
}

fn parse_frame(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Frame, Error> {
    // The first byte in an RESP-serialized payload always identifies its type.
    // Subsequent bytes constitute the type's contents.
    let first_byte = get_byte(src)?;
    let data_type = match DataType::try_from(first_byte) {
        Ok(data_type) => data_type,
        Err(err) => {
            // Drop whatever else is on the offending line along with the marker, which means
            // waiting until the whole line is buffered.
            return match get_line(src) {
                Err(Error::Incomplete(_)) => Err(Error::Incomplete(err)),
                _ => Err(err.into()),
            };
        }
    };

    match data_type {
        DataType::SimpleString => {
            let line = get_line(src)?;
            Ok(Frame::Simple(Bytes::copy_from_slice(line)))
        }
        DataType::SimpleError => {
            let line = get_line(src)?;
            Ok(Frame::Error(Bytes::copy_from_slice(line)))
        }
        DataType::Integer => {
            let line = get_line(src)?;
            let integer = std::str::from_utf8(line)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(ProtocolError::InvalidNumber)?;

            Ok(Frame::Integer(integer))
        }
        // $<length>\r\n<data>\r\n
        DataType::BulkString => {
            let length = get_length(src)?;
            let data = get_payload(src, length)?;

            Ok(Frame::Bulk(Bytes::copy_from_slice(data)))
        }
        // =<length>\r\n<format>:<data>\r\n
        DataType::VerbatimString => {
            let length = get_length(src)?;
            let payload = get_payload(src, length)?;

            match payload {
                [a, b, c, b':', data @ ..] => Ok(Frame::Verbatim {
                    format: [*a, *b, *c],
                    data: Bytes::copy_from_slice(data),
                }),
                _ => Err(ProtocolError::InvalidVerbatim.into()),
            }
        }
        // *<number-of-elements>\r\n<element-1>...<element-n>
        DataType::Array => {
            if depth >= MAX_DEPTH {
                return Err(ProtocolError::TooDeep.into());
            }

            let length = get_length(src)?;

            // Every element takes at least three bytes, so a bogus length can't make us reserve
            // more than what is actually buffered.
            let mut frames = Vec::with_capacity(length.min(src.remaining()));
            for _ in 0..length {
                let frame = parse_frame(src, depth + 1)?;
                frames.push(frame);
            }

            Ok(Frame::Array(frames))
        }
        // _\r\n
        DataType::Null => {
            let line = get_line(src)?;
            if !line.is_empty() {
                return Err(ProtocolError::InvalidNull.into());
            }

            Ok(Frame::Null)
        }
    }
}

/// Reads up to the first CRLF. A `\r` that is not followed by `\n` is part of the content.
fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete(ProtocolError::TruncatedFrame))?;

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_length(src: &mut Cursor<&[u8]>) -> Result<usize, Error> {
    let line = get_line(src)?;

    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| ProtocolError::InvalidLength.into())
}

/// Reads exactly `length` raw bytes followed by CRLF.
fn get_payload<'a>(src: &mut Cursor<&'a [u8]>, length: usize) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();
    let available = buf.len() - start;

    if available < length {
        return Err(Error::Incomplete(ProtocolError::TruncatedBlob));
    }

    let end = start + length;
    let terminator = &buf[end..buf.len().min(end + CRLF.len())];
    if !CRLF.starts_with(terminator) {
        // Skip past the payload and the rest of that line.
        src.set_position(end as u64);
        return match get_line(src) {
            Err(Error::Incomplete(_)) => Err(Error::Incomplete(ProtocolError::MissingTerminator)),
            _ => Err(ProtocolError::MissingTerminator.into()),
        };
    }
    if terminator.len() < CRLF.len() {
        return Err(Error::Incomplete(ProtocolError::MissingTerminator));
    }

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete(ProtocolError::TruncatedFrame));
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString,   // '+'
    BulkString,     // '$'
    VerbatimString, // '='
    SimpleError,    // '-'
    Integer,        // ':'
    Array,          // '*'
    // Due to historical reasons, RESP2 features two specially crafted values for representing null
    // values of bulk strings and arrays. The null type, introduced in RESP3, is the only null we
    // speak.
    Null, // '_'
}

impl TryFrom<u8> for DataType {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'=' => Ok(Self::VerbatimString),
            b'*' => Ok(Self::Array),
            b'_' => Ok(Self::Null),
            _ => Err(ProtocolError::UnrecognizedType(char::from(byte))),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::VerbatimString => b'=',
            DataType::Array => b'*',
            DataType::Null => b'_',
        }
    }
}
