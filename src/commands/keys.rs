use bytes::Bytes;
use itertools::Itertools;
use regex::bytes::Regex;

use crate::commands::executable::Executable;
use crate::commands::{CommandError, CommandParser};
use crate::frame::Frame;
use crate::store::Store;

/// Returns all keys matching `pattern`. Only `*` is a wildcard, matching any run of bytes;
/// everything else matches literally and the whole key has to match.
///
/// Ref: <https://redis.io/commands/keys>
#[derive(Debug, PartialEq)]
pub struct Keys {
    pub pattern: Bytes,
}

impl Keys {
    fn matcher(&self) -> Result<Regex, CommandError> {
        let body = self
            .pattern
            .split(|&byte| byte == b'*')
            .map(literal)
            .join(".*");

        // Byte-oriented with `.` matching `\n`, so `*` spans any run of bytes.
        Regex::new(&format!("(?s-u)^{body}$"))
            .map_err(|e| CommandError::InvalidPattern(e.to_string()))
    }
}

/// Regex source matching `bytes` literally. Anything but printable ASCII is written as `\xHH`.
fn literal(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&byte| match byte {
            b' '..=b'~' => regex::escape(&char::from(byte).to_string()),
            _ => format!(r"\x{byte:02X}"),
        })
        .collect()
}

impl Executable for Keys {
    fn exec(self, store: Store) -> Result<Frame, CommandError> {
        let matcher = self.matcher()?;

        let state = store.lock();
        let keys = state
            .keys()
            .filter(|key| matcher.is_match(key))
            .map(|key| Frame::Bulk(Bytes::copy_from_slice(key)))
            .collect();

        Ok(Frame::Array(keys))
    }
}

impl TryFrom<&mut CommandParser> for Keys {
    type Error = CommandError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let pattern = parser.next_bytes("pattern")?;
        Ok(Self { pattern })
    }
}
